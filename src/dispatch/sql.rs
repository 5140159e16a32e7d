use super::{RoutineCall, RoutineKind};

/// Column holding each function row as JSON.
pub const ROW_COLUMN: &str = "row";

/// Build the statement for a routine call. Function rows are wrapped in
/// `row_to_json` so any column type survives the trip to JSON; procedure OUT
/// parameters are decoded column by column since `CALL` cannot be wrapped.
pub fn render(call: &RoutineCall) -> String {
    let placeholders = call
        .params
        .iter()
        .enumerate()
        .map(|(i, p)| format!("${}::{}", i + 1, p.sql_type))
        .collect::<Vec<_>>()
        .join(", ");

    match call.kind {
        RoutineKind::Procedure => format!("CALL {}({})", call.name, placeholders),
        RoutineKind::Function => format!(
            "SELECT row_to_json(t) AS {} FROM (SELECT * FROM {}({})) t",
            ROW_COLUMN, call.name, placeholders
        ),
    }
}

/// Statement that publishes the acting user to triggers for the current
/// transaction only.
pub const SET_ACTING_USER: &str = "SELECT set_config('app.current_user', $1, true)";
