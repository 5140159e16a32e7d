//! Turns PostgreSQL's "undefined function" error into an actionable message by
//! looking the routine up in `pg_proc`.

use sqlx::{PgPool, Row as _};

use crate::dispatch::{DispatchError, RoutineCall, RoutineKind};

/// A routine visible on the search path under the requested name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineSignature {
    pub kind: Option<RoutineKind>,
    pub arguments: String,
}

const LOOKUP_SQL: &str = r#"
    SELECT p.prokind::text AS kind,
           pg_get_function_identity_arguments(p.oid) AS arguments
    FROM pg_proc p
    WHERE p.proname = lower($1)
      AND pg_function_is_visible(p.oid)
    ORDER BY 2
"#;

pub async fn lookup(pool: &PgPool, name: &str) -> Result<Vec<RoutineSignature>, sqlx::Error> {
    let rows = sqlx::query(LOOKUP_SQL).bind(name).fetch_all(pool).await?;
    rows.iter()
        .map(|row| {
            let kind: String = row.try_get("kind")?;
            Ok(RoutineSignature {
                kind: RoutineKind::from_prokind(&kind),
                arguments: row.try_get("arguments")?,
            })
        })
        .collect()
}

/// Decide why `call` failed to resolve given what `pg_proc` knows.
pub fn classify(call: &RoutineCall, found: &[RoutineSignature]) -> DispatchError {
    let name = call.name.to_string();
    let same_kind: Vec<&RoutineSignature> = found
        .iter()
        .filter(|sig| sig.kind == Some(call.kind))
        .collect();

    if found.is_empty() {
        return DispatchError::RoutineMissing { kind: call.kind, name };
    }

    if same_kind.is_empty() {
        if let Some(actual) = found.iter().find_map(|sig| sig.kind) {
            return DispatchError::WrongKind {
                requested: call.kind,
                actual,
                name,
            };
        }
        return DispatchError::RoutineMissing { kind: call.kind, name };
    }

    DispatchError::SignatureMismatch {
        kind: call.kind,
        supplied: call.signature(),
        available: same_kind
            .iter()
            .map(|sig| format!("{}({})", name, sig.arguments))
            .collect(),
        name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{RoutineName, RpcParam};
    use serde_json::json;

    fn call(kind: RoutineKind, name: &str, params: serde_json::Value) -> RoutineCall {
        let params: Vec<RpcParam> = serde_json::from_value(params).unwrap();
        RoutineCall::new(kind, RoutineName::parse(name).unwrap(), &params).unwrap()
    }

    fn signature(kind: RoutineKind, arguments: &str) -> RoutineSignature {
        RoutineSignature {
            kind: Some(kind),
            arguments: arguments.to_string(),
        }
    }

    #[test]
    fn reports_missing_routine_when_pg_proc_is_empty() {
        let err = classify(&call(RoutineKind::Procedure, "upsert_hotel", json!([1])), &[]);
        assert!(matches!(err, DispatchError::RoutineMissing { kind: RoutineKind::Procedure, .. }));
    }

    #[test]
    fn reports_signature_mismatch_with_available_overloads() {
        let found = vec![signature(
            RoutineKind::Procedure,
            "p_cod integer, p_nombre character varying",
        )];
        let err = classify(
            &call(RoutineKind::Procedure, "upsert_airline", json!(["x", "Avior"])),
            &found,
        );

        match err {
            DispatchError::SignatureMismatch { supplied, available, .. } => {
                assert_eq!(supplied, vec!["TEXT", "TEXT"]);
                assert_eq!(
                    available,
                    vec!["upsert_airline(p_cod integer, p_nombre character varying)"]
                );
            }
            other => panic!("expected signature mismatch, got {other:?}"),
        }
    }

    #[test]
    fn reports_wrong_endpoint_when_only_the_other_kind_exists() {
        let found = vec![signature(RoutineKind::Function, "p_id integer")];
        let err = classify(&call(RoutineKind::Procedure, "get_user_by_id", json!([4])), &found);
        assert!(matches!(
            err,
            DispatchError::WrongKind {
                requested: RoutineKind::Procedure,
                actual: RoutineKind::Function,
                ..
            }
        ));
    }
}
