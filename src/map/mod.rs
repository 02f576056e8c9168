mod document;
mod error;
mod graph;
mod synthesis;
mod validate;

pub use document::{export_document, load_map_file, parse_document, write_map_file};
pub use error::{MapError, SchemaError, SchemaIssue};
pub use graph::{
    Link, MapGraph, MapMeta, Metric, Node, NodeContent, NodeKind, Position, Quote, Report,
    TopicItem,
};
pub use synthesis::{
    CommandCompletion, CompletionService, Expansion, SynthesisError, expand_node,
    extract_json_object, merge_expansion, parse_expansion, parse_synthesized_map, synthesize_map,
};
pub use validate::validate;
