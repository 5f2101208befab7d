//! Built-in strategies for the injectable failure kinds

use super::{FixStrategy, Patched, replace_defect};
use crate::domain::FailureKind;

const NULL_GUARD_DEFECT: &str = "    # BUG: no None-check — crashes with AttributeError when user_data is None
    result = user_data.get(\"name\")
    email  = user_data.get(\"email\", \"unknown\")";

const NULL_GUARD_FIXED: &str = "    # FIXED: guard against None input
    if user_data is None:
        logger.warning(\"process_user_data received None — returning default\")
        return {\"processed_name\": \"UNKNOWN\", \"email\": \"unknown\", \"status\": \"default\"}
    result = user_data.get(\"name\", \"unknown\")
    email  = user_data.get(\"email\", \"unknown\")";

/// Adds a None guard to `process_user_data`
pub struct NullGuardFix;

impl FixStrategy for NullGuardFix {
    fn kind(&self) -> FailureKind {
        FailureKind::NullPointer
    }

    fn resource(&self) -> &'static str {
        "app/broken_module.py"
    }

    fn diagnosis(&self) -> &'static str {
        "missing None guard on line 18"
    }

    fn action(&self) -> &'static str {
        "add `if user_data is None` guard"
    }

    fn description(&self) -> &'static str {
        "Added None-guard at top of process_user_data()"
    }

    fn diff(&self) -> &'static str {
        "- result = user_data.get('name')\n\
         + if user_data is None:\n\
         +     return {'processed_name': 'UNKNOWN', ...}\n\
         + result = user_data.get('name', 'unknown')"
    }

    fn patch(&self, content: &str) -> Result<Patched, String> {
        replace_defect(content, NULL_GUARD_DEFECT, NULL_GUARD_FIXED, self.resource())
    }
}

const COLUMN_DEFECT: &str = "\"SELECT id, usr_email, username FROM users WHERE id = ?\"";
const COLUMN_FIXED: &str = "\"SELECT id, user_email, username FROM users WHERE id = ?\"";

/// Corrects the misspelled column in the user lookup query
pub struct ColumnNameFix;

impl FixStrategy for ColumnNameFix {
    fn kind(&self) -> FailureKind {
        FailureKind::SqlError
    }

    fn resource(&self) -> &'static str {
        "app/database.py"
    }

    fn diagnosis(&self) -> &'static str {
        "column 'usr_email' should be 'user_email'"
    }

    fn action(&self) -> &'static str {
        "fix column name in SELECT query"
    }

    fn description(&self) -> &'static str {
        "Fixed SQL column name: 'usr_email' → 'user_email'"
    }

    fn diff(&self) -> &'static str {
        "- 'SELECT id, usr_email, username FROM users WHERE id = ?'\n\
         + 'SELECT id, user_email, username FROM users WHERE id = ?'"
    }

    fn patch(&self, content: &str) -> Result<Patched, String> {
        replace_defect(content, COLUMN_DEFECT, COLUMN_FIXED, self.resource())
    }
}

const LOOP_DEFECT: &str = "        counter += 2                   # BUG: skips odd numbers → infinite loop";
const LOOP_FIXED: &str = "        counter += 1                   # FIXED: correct increment";

/// Restores the unit increment in `calculate_stats`
pub struct LoopIncrementFix;

impl FixStrategy for LoopIncrementFix {
    fn kind(&self) -> FailureKind {
        FailureKind::InfiniteLoop
    }

    fn resource(&self) -> &'static str {
        "app/broken_module.py"
    }

    fn diagnosis(&self) -> &'static str {
        "counter += 2 skips odd targets → infinite loop"
    }

    fn action(&self) -> &'static str {
        "change increment to 1"
    }

    fn description(&self) -> &'static str {
        "Fixed infinite loop: counter increment changed from 2 → 1"
    }

    fn diff(&self) -> &'static str {
        "- counter += 2   # BUG: skips odd numbers → infinite loop\n\
         + counter += 1   # FIXED: correct increment"
    }

    fn patch(&self, content: &str) -> Result<Patched, String> {
        replace_defect(content, LOOP_DEFECT, LOOP_FIXED, self.resource())
    }
}
