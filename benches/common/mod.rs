use docgraph::{GraphStore, Node};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BenchNode {
    pub id: String,
    pub name: String,
    pub idx: usize,
}

impl Node for BenchNode {
    type Id = String;

    fn id(&self) -> String {
        self.id.clone()
    }
}

#[derive(Clone, Copy, Debug)]
pub enum GraphShape {
    Line,
    Random { edges: usize },
}

pub struct GraphDataset {
    pub nodes: Vec<BenchNode>,
    pub edges: Vec<(usize, usize)>,
}

pub fn generate_graph(shape: GraphShape, node_count: usize, seed: u64) -> GraphDataset {
    assert!(node_count > 1, "node_count must exceed 1");
    let nodes = (0..node_count)
        .map(|idx| BenchNode {
            id: format!("node-{idx}"),
            name: format!("Node{idx}"),
            idx,
        })
        .collect();
    let edges = match shape {
        GraphShape::Line => (0..node_count - 1).map(|idx| (idx, idx + 1)).collect(),
        GraphShape::Random { edges } => {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..edges)
                .map(|_| (rng.gen_range(0..node_count), rng.gen_range(0..node_count)))
                .collect()
        }
    };
    GraphDataset { nodes, edges }
}

pub fn load(store: &GraphStore, dataset: &GraphDataset) {
    for node in &dataset.nodes {
        store.insert_node(node).expect("node insert");
    }
    for &(source, target) in &dataset.edges {
        store
            .insert_edge_with_properties(
                &dataset.nodes[source].id,
                &dataset.nodes[target].id,
                &json!({ "weight": source ^ target }),
            )
            .expect("edge insert");
    }
}
