use immulog::engine::{Params, SqlValue, VerifiedEngine};
use immulog::query::{
    BatchTransaction, ComparisonOperator, Condition, ConditionBuilder, InsertQueryBuilder,
    QueryError, ReadQueryBuilder, SortDirection,
};
use immulog::MemoryEngine;

fn tag_condition(count: usize) -> ConditionBuilder {
    let mut builder = ConditionBuilder::new();
    for i in 0..count {
        builder.add_or(Condition::leaf(
            "TAGS.tag",
            ComparisonOperator::Eq,
            format!("@tag{}", i),
        ));
    }
    builder
}

#[test]
fn test_cursor_page_query_shape() {
    let mut conditions = tag_condition(2);
    conditions.add_and_on_left(Condition::leaf("LOGS.id", ComparisonOperator::Lt, "@lastid"));

    let query = ReadQueryBuilder::new()
        .select(&["LOGS.id", "LOGS.log"])
        .unwrap()
        .from(&["LOGS"])
        .unwrap()
        .join("TAGS", "LOGS.uniqueidentifier", "TAGS.uniqueidentifier")
        .unwrap()
        .where_condition(&conditions.build())
        .unwrap()
        .order_by("LOGS.id", SortDirection::Desc)
        .unwrap()
        .limit(256)
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(
        query,
        "SELECT LOGS.id,LOGS.log FROM LOGS INNER JOIN TAGS ON LOGS.uniqueidentifier = \
         TAGS.uniqueidentifier WHERE (LOGS.id < @lastid AND (TAGS.tag = @tag0 OR TAGS.tag = @tag1)) \
         ORDER BY LOGS.id DESC LIMIT 256"
    );
}

#[test]
fn test_out_of_order_clause_reports_states() {
    let mut builder = ReadQueryBuilder::new();
    builder.select(&["log"]).unwrap();
    let err = builder.limit(1).unwrap_err();
    assert_eq!(err.to_string(), "Cannot switch to state LIMIT from SELECT");
}

#[test]
fn test_batch_of_inserts_frames_statements() {
    let mut logs = InsertQueryBuilder::new();
    logs.insert_into("LOGS", &["log"]).unwrap();
    logs.values(0, &["log"]).unwrap().values(1, &["log"]).unwrap();

    let mut batch = BatchTransaction::new();
    batch.add_query(logs.build().unwrap());
    assert_eq!(
        batch.build().unwrap(),
        "BEGIN TRANSACTION\nINSERT INTO LOGS (log) VALUES(@log0), (@log1);\nCOMMIT"
    );
    assert_eq!(BatchTransaction::new().build(), Err(QueryError::EmptyBatch));
}

#[tokio::test]
async fn test_built_statements_execute_against_engine() {
    let engine = MemoryEngine::new("immudb", "immudb");
    engine.login("immudb", "immudb").await.unwrap();
    engine
        .execute(
            "CREATE TABLE IF NOT EXISTS LOGS(id INTEGER AUTO_INCREMENT, log VARCHAR[64] NOT NULL, PRIMARY KEY (id));",
            &Params::new(),
        )
        .await
        .unwrap();

    let mut insert = InsertQueryBuilder::new();
    insert.insert_into("LOGS", &["log"]).unwrap();
    let mut params = Params::new();
    for (i, value) in ["first", "second", "third"].iter().enumerate() {
        insert.values(i, &["log"]).unwrap();
        params.insert(format!("log{}", i), SqlValue::from(*value));
    }
    let mut batch = BatchTransaction::new();
    batch.add_query(insert.build().unwrap());
    engine.execute(&batch.build().unwrap(), &params).await.unwrap();

    let query = ReadQueryBuilder::new()
        .select(&["log"])
        .unwrap()
        .from(&["LOGS"])
        .unwrap()
        .where_field("id", 1, ComparisonOperator::Gt)
        .unwrap()
        .order_by("id", SortDirection::Desc)
        .unwrap()
        .limit(1)
        .unwrap()
        .build()
        .unwrap();
    let rows = engine.query(&query, &Params::new()).await.unwrap();
    assert_eq!(rows, vec![vec![SqlValue::from("third")]]);
}
