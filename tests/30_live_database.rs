// Runs against the database configured through DB_* variables. Each test
// returns early when PostgreSQL is not reachable.

use anyhow::Result;
use serde_json::{json, Value};
use std::time::Duration;

use viajes_gateway::config;
use viajes_gateway::database::{Database, PgExecutor, RoutineExecutor};
use viajes_gateway::dispatch::{DispatchError, RoutineCall, RoutineKind, RoutineName, RpcParam};
use viajes_gateway::types::ActingUser;

async fn connect() -> Option<Database> {
    match Database::connect(&config::config().database).await {
        Ok(db) => Some(db),
        Err(e) => {
            eprintln!("skipping: database unavailable ({})", e);
            None
        }
    }
}

async fn executor() -> Option<PgExecutor> {
    connect().await.map(|db| PgExecutor::new(db, Duration::from_secs(5)))
}

async fn run_all(db: &Database, statements: &[&str]) -> Result<()> {
    for statement in statements {
        sqlx::query(statement).execute(db.pool()).await?;
    }
    Ok(())
}

fn call(kind: RoutineKind, name: &str, params: Value) -> RoutineCall {
    let params: Vec<RpcParam> = serde_json::from_value(params).unwrap();
    RoutineCall::new(kind, RoutineName::parse(name).unwrap(), &params).unwrap()
}

#[tokio::test]
async fn acting_user_is_visible_inside_the_call() -> Result<()> {
    let Some(executor) = executor().await else { return Ok(()) };

    let setting = call(
        RoutineKind::Function,
        "current_setting",
        json!(["app.current_user", true]),
    );

    let rows = executor.execute(&setting, ActingUser::new(42)).await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["current_setting"], "42");

    // Transaction-local: gone once the audited call commits
    let rows = executor.execute(&setting, None).await?;
    let after = &rows[0]["current_setting"];
    assert!(after.is_null() || after == "", "leaked acting user: {}", after);
    Ok(())
}

#[tokio::test]
async fn functions_return_every_row() -> Result<()> {
    let Some(executor) = executor().await else { return Ok(()) };

    let series = call(
        RoutineKind::Function,
        "generate_series",
        json!([1, { "value": 3, "type": "INTEGER" }]),
    );
    let rows = executor.execute(&series, None).await?;

    let values: Vec<&Value> = rows.iter().map(|row| &row["generate_series"]).collect();
    assert_eq!(values, vec![&json!(1), &json!(2), &json!(3)]);
    Ok(())
}

#[tokio::test]
async fn missing_routines_are_diagnosed() -> Result<()> {
    let Some(executor) = executor().await else { return Ok(()) };

    let err = executor
        .execute(&call(RoutineKind::Procedure, "no_such_routine_xyz", json!([])), None)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::RoutineMissing { .. }), "got {:?}", err);
    Ok(())
}

#[tokio::test]
async fn overload_mismatches_list_the_signatures() -> Result<()> {
    let Some(executor) = executor().await else { return Ok(()) };

    let err = executor
        .execute(
            &call(RoutineKind::Function, "lower", json!([{ "value": 1, "type": "INTEGER" }])),
            None,
        )
        .await
        .unwrap_err();

    match err {
        DispatchError::SignatureMismatch { supplied, available, .. } => {
            assert_eq!(supplied, vec!["INTEGER".to_string()]);
            assert!(available.iter().any(|sig| sig.contains("text")), "{:?}", available);
        }
        other => panic!("expected a signature mismatch, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn calling_a_function_as_a_procedure_is_diagnosed() -> Result<()> {
    let Some(executor) = executor().await else { return Ok(()) };

    let err = executor
        .execute(&call(RoutineKind::Procedure, "lower", json!(["ABC"])), None)
        .await
        .unwrap_err();

    assert!(
        matches!(err, DispatchError::WrongKind { actual: RoutineKind::Function, .. }),
        "got {:?}",
        err
    );
    Ok(())
}

#[tokio::test]
async fn procedure_out_parameters_keep_their_types() -> Result<()> {
    let Some(db) = connect().await else { return Ok(()) };
    let executor = PgExecutor::new(db.clone(), Duration::from_secs(5));

    run_all(
        &db,
        &[r#"
        CREATE OR REPLACE PROCEDURE viajes_test_out_types(
            OUT ids INTEGER[],
            OUT tags TEXT[],
            OUT dur INTERVAL,
            OUT salida TIMETZ,
            OUT tarifa REAL
        )
        LANGUAGE plpgsql AS $$
        BEGIN
            ids := ARRAY[1, 23, NULL, 3];
            tags := ARRAY['playa', 'montaña'];
            dur := INTERVAL '1 day 02:30:00';
            salida := '10:30:00+02'::TIMETZ;
            tarifa := 0.1;
        END;
        $$
        "#],
    )
    .await?;

    let out = call(
        RoutineKind::Procedure,
        "viajes_test_out_types",
        json!([
            { "value": null, "type": "INTEGER[]" },
            { "value": null, "type": "TEXT[]" },
            { "value": null, "type": "INTERVAL" },
            { "value": null, "type": "TIMETZ" },
            { "value": null, "type": "REAL" }
        ]),
    );
    let result = executor.execute(&out, None).await;
    run_all(&db, &["DROP PROCEDURE IF EXISTS viajes_test_out_types"]).await?;

    let rows = result?;
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row["ids"], json!([1, 23, null, 3]));
    assert_eq!(row["tags"], json!(["playa", "montaña"]));
    assert_eq!(row["dur"], "P1DT2H30M");
    assert_eq!(row["salida"], "10:30:00+02:00");
    assert_eq!(row["tarifa"], json!(0.1));
    Ok(())
}

#[tokio::test]
async fn acting_user_is_rolled_back_with_a_failed_call() -> Result<()> {
    let Some(db) = connect().await else { return Ok(()) };
    let executor = PgExecutor::new(db.clone(), Duration::from_secs(5));

    run_all(
        &db,
        &[
            "DROP TABLE IF EXISTS viajes_test_audit",
            "CREATE TABLE viajes_test_audit (id SERIAL PRIMARY KEY, monto INTEGER, actor TEXT)",
            r#"
            CREATE OR REPLACE PROCEDURE viajes_test_audited(p_monto INTEGER)
            LANGUAGE plpgsql AS $$
            BEGIN
                INSERT INTO viajes_test_audit (monto, actor)
                VALUES (p_monto, current_setting('app.current_user', true));
                IF p_monto < 0 THEN
                    RAISE EXCEPTION 'monto negativo: %', p_monto;
                END IF;
            END;
            $$
            "#,
        ],
    )
    .await?;

    let actor = ActingUser::new(42);
    let accepted = executor
        .execute(&call(RoutineKind::Procedure, "viajes_test_audited", json!([150])), actor)
        .await;
    let rejected = executor
        .execute(&call(RoutineKind::Procedure, "viajes_test_audited", json!([-5])), actor)
        .await;
    let audit: Result<Vec<(i32, Option<String>)>, sqlx::Error> =
        sqlx::query_as("SELECT monto, actor FROM viajes_test_audit ORDER BY id")
            .fetch_all(db.pool())
            .await;

    run_all(
        &db,
        &[
            "DROP PROCEDURE IF EXISTS viajes_test_audited",
            "DROP TABLE IF EXISTS viajes_test_audit",
        ],
    )
    .await?;

    accepted?;
    match rejected {
        Err(DispatchError::Postgres(failure)) => {
            assert_eq!(failure.code.as_deref(), Some("P0001"));
            assert!(failure.message.contains("monto negativo"), "{}", failure.message);
        }
        other => panic!("expected the procedure to raise, got {:?}", other),
    }
    assert_eq!(audit?, vec![(150, Some("42".to_string()))]);
    Ok(())
}
