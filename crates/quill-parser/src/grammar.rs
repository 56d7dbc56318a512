//! Pest-generated parser for the SQL grammar

use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "sql.pest"]
pub struct QuillParser;
