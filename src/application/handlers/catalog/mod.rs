//! Catalog handlers.

mod get_plan;
mod list_plans;

pub use get_plan::{GetPlanHandler, GetPlanQuery};
pub use list_plans::{ListPlansHandler, ListPlansQuery};
