use crate::PipelineSpec;
use std::collections::{BTreeMap, BTreeSet};

pub type RouteMap = BTreeMap<String, BTreeSet<String>>;

/// Input-to-output adjacency derived from pipelines, and its transpose.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Routes {
    pub by_input: RouteMap,
    pub by_output: RouteMap,
}

impl Routes {
    pub fn new(pipelines: &[PipelineSpec]) -> Self {
        let mut routes = Self::default();
        for p in pipelines {
            for input in &p.input_refs {
                for output in &p.output_refs {
                    routes.insert(input, output);
                }
            }
        }
        routes
    }

    fn insert(&mut self, input: &str, output: &str) {
        self.by_input
            .entry(input.to_string())
            .or_default()
            .insert(output.to_string());
        self.by_output
            .entry(output.to_string())
            .or_default()
            .insert(input.to_string());
    }

    pub fn outputs_of(&self, input: &str) -> impl Iterator<Item = &str> {
        self.by_input
            .get(input)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    pub fn inputs_of(&self, output: &str) -> impl Iterator<Item = &str> {
        self.by_output
            .get(output)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }
}

/// Names of the pipelines feeding each output, in pipeline order.
pub fn pipelines_by_output(pipelines: &[PipelineSpec]) -> BTreeMap<&str, Vec<&str>> {
    let mut by_output = BTreeMap::<&str, Vec<&str>>::new();
    for p in pipelines {
        for o in &p.output_refs {
            let names = by_output.entry(o.as_str()).or_default();
            if !names.contains(&p.name.as_str()) {
                names.push(p.name.as_str());
            }
        }
    }
    by_output
}
