//! Static privilege requirements for routines that change catalog or
//! security data. Routines missing from the table are open to everyone.

use serde_json::Value;
use tracing::{debug, warn};

use crate::database::RoutineExecutor;
use crate::dispatch::{RoutineName, RpcParam};
use crate::error::ApiError;
use crate::types::ActingUser;

/// Privilege a routine demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Fixed(&'static str),
    /// `upsert_*` routines: the first parameter is the row id, zero or null
    /// when creating.
    CreateOrEdit {
        create: &'static str,
        edit: &'static str,
    },
}

const RULES: &[(&str, Requirement)] = &[
    ("upsert_airline", Requirement::CreateOrEdit { create: "create_airline", edit: "edit_airline" }),
    ("upsert_package", Requirement::CreateOrEdit { create: "create_package", edit: "edit_package" }),
    ("upsert_promotion", Requirement::CreateOrEdit { create: "create_promotion", edit: "edit_promotion" }),
    ("delete_airline", Requirement::Fixed("delete_airline")),
    ("delete_package", Requirement::Fixed("delete_package")),
    ("delete_promotion", Requirement::Fixed("delete_promotion")),
    ("create_role", Requirement::Fixed("manage_roles")),
    ("update_role", Requirement::Fixed("manage_roles")),
    ("delete_role", Requirement::Fixed("manage_roles")),
    ("assign_privilege_to_role", Requirement::Fixed("manage_roles")),
    ("revoke_privilege_from_role", Requirement::Fixed("manage_roles")),
    ("update_user_role", Requirement::Fixed("manage_users")),
    ("delete_user", Requirement::Fixed("manage_users")),
    ("process_refund", Requirement::Fixed("process_refund")),
];

pub fn requirement(name: &str) -> Option<Requirement> {
    RULES
        .iter()
        .find(|(routine, _)| *routine == name)
        .map(|(_, requirement)| *requirement)
}

/// Privilege needed to run `name` with `params`, if any.
pub fn required_privilege(name: &str, params: &[RpcParam]) -> Option<&'static str> {
    requirement(name).map(|req| match req {
        Requirement::Fixed(privilege) => privilege,
        Requirement::CreateOrEdit { create, edit } => {
            if params.first().map(RpcParam::value).is_some_and(carries_id) {
                edit
            } else {
                create
            }
        }
    })
}

/// A non-zero number, or a string other than "" and "0".
fn carries_id(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => {
            let s = s.trim();
            !s.is_empty() && s != "0"
        }
        _ => false,
    }
}

/// Check the caller may run the routine. Denials carry the missing privilege
/// so the client can explain what is needed.
pub async fn authorize(
    executor: &dyn RoutineExecutor,
    name: &RoutineName,
    params: &[RpcParam],
    actor: Option<ActingUser>,
) -> Result<(), ApiError> {
    let Some(privilege) = required_privilege(name.as_str(), params) else {
        return Ok(());
    };

    let Some(user) = actor else {
        debug!("Anonymous call to {} requires {}", name, privilege);
        return Err(ApiError::privilege_denied(
            401,
            "Debe iniciar sesión para realizar esta operación",
            privilege,
        ));
    };

    if executor.user_has_privilege(user, privilege).await? {
        debug!("User {} holds {} for {}", user, privilege, name);
        return Ok(());
    }

    warn!("User {} lacks {} for {}", user, privilege, name);
    Err(ApiError::privilege_denied(
        403,
        format!("No tiene permisos para realizar esta operación. Privilegio requerido: {}", privilege),
        privilege,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(values: Value) -> Vec<RpcParam> {
        serde_json::from_value(values).unwrap()
    }

    #[test]
    fn fixed_requirements_ignore_parameters() {
        assert_eq!(required_privilege("delete_package", &params(json!([5]))), Some("delete_package"));
        assert_eq!(required_privilege("delete_role", &[]), Some("manage_roles"));
    }

    #[test]
    fn unlisted_routines_need_nothing() {
        assert_eq!(required_privilege("get_packages", &[]), None);
        assert_eq!(required_privilege("authenticate_user", &params(json!(["a@b.com", "x"]))), None);
    }

    #[test]
    fn upserts_with_an_id_need_the_edit_privilege() {
        for first in [json!(12), json!("12"), json!({"value": 3, "type": "INTEGER"}), json!(-1)] {
            let p = params(json!([first, "Avior Airlines"]));
            assert_eq!(required_privilege("upsert_airline", &p), Some("edit_airline"), "{first}");
        }
        assert_eq!(
            required_privilege("upsert_package", &params(json!([8, "Los Roques"]))),
            Some("edit_package")
        );
    }

    #[test]
    fn upserts_without_an_id_need_the_create_privilege() {
        for first in [
            json!(0),
            json!("0"),
            json!(""),
            Value::Null,
            json!({"value": null, "type": "INTEGER"}),
            json!({"value": 0, "type": "INTEGER"}),
        ] {
            let p = params(json!([first, "Promo Carnaval"]));
            assert_eq!(required_privilege("upsert_promotion", &p), Some("create_promotion"), "{first}");
        }
        assert_eq!(required_privilege("upsert_airline", &[]), Some("create_airline"));
    }
}
