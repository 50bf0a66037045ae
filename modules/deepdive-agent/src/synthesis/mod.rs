//! LLM-backed synthesis steps of a research run: fact extraction, next-query
//! planning and the final report.

mod extractor;
mod planner;
mod report;

pub use extractor::{heuristic_facts, parse_json_facts, parse_marked_facts, FactExtractor};
pub use planner::{clean_query, QueryPlanner, PLANNER_FACT_WINDOW};
pub use report::{ReportGenerator, REPORT_FAILURE};
