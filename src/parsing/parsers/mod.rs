//! Built-in parser plugins, one per markdown construct.

mod code_blocks;
mod document;
mod footnotes;
mod headings;
mod links;
mod lists;

pub use code_blocks::CodeBlockParser;
pub use document::DocumentParser;
pub use footnotes::FootnoteParser;
pub use headings::HeadingParser;
pub use links::LinkParser;
pub use lists::ListParser;
