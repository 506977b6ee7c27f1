//! Build, inspect and run a query against Postgres.
//!
//! Run with: cargo run --example basic -p selectqb
//!
//! Connection settings come from the environment (or a `.env` file):
//! server=localhost database=postgres user=postgres password=postgres

use selectqb::{LoggingMonitor, OrderBy, QbError, QueryBuilder, StatsMonitor};
use std::sync::Arc;
use std::time::Duration;

const PLANETS: &str = "(VALUES ('Mercury', 0.39, 0), ('Venus', 0.72, 0), ('Earth', 1.0, 1), \
                       ('Mars', 1.52, 2), ('Jupiter', 5.2, 95)) AS p(name, au, moons)";

#[tokio::main]
async fn main() -> Result<(), QbError> {
    dotenvy::dotenv().ok();

    let stats = Arc::new(StatsMonitor::new());
    let mut qb = QueryBuilder::from_env()?;
    qb.with_monitor(LoggingMonitor::new())
        .with_monitor_arc(stats.clone())
        .with_slow_query_threshold(Duration::from_millis(250));

    let max_au = qb.input(2.0);
    qb.select("name, au AS distance, moons > 0 AS \"has moons\"")?
        .from(PLANETS)
        .where_(format!("au < {max_au}"))
        .order_by(OrderBy::desc("au"))
        .fetch(3);

    println!("SQL: {}", qb.build_query()?);

    for row in qb.execute().await? {
        println!("{row:?}");
    }
    println!("took {:?}", qb.elapsed());
    println!("rows matching: {}", qb.row_count().await?);
    println!("moon counts: {:?}", qb.distinct_values("moons").await?);

    // The same query, loaded back from text.
    let mut reparsed = QueryBuilder::from_env()?;
    reparsed.input_float(2.0, "__QB_INPUT_1__");
    reparsed.parse(&qb.build_query()?)?;
    assert_eq!(reparsed.build_query()?, qb.build_query()?);

    println!("{:?}", stats.stats());
    Ok(())
}
