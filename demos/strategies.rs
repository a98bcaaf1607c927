//! Chunking Strategies Comparison
//!
//! Demonstrates the three strategies and their trade-offs on the same
//! structured document.
//!
//! ```bash
//! cargo run --example strategies
//! ```

use strata::{detect, Chunker, DetectorConfig, FixedChunker, HybridChunker, SemanticChunker};

fn main() {
    println!("Chunking Strategies");
    println!("===================\n");

    let document = "\
# Machine Learning

Machine learning models learn patterns from data. They generalize these \
patterns to make predictions on new, unseen examples.

## Training

The training process involves a forward pass, loss computation, and \
backpropagation. Gradients flow backward, updating weights.

<table><tr><th>epoch</th><th>loss</th></tr><tr><td>1</td><td>0.92</td></tr>\
<tr><td>2</td><td>0.61</td></tr></table>

# History

Backpropagation was pioneered in the 1980s. Work at the University of \
Toronto laid the foundation for modern deep learning.";

    let regions = detect(document, &DetectorConfig::default());
    println!(
        "Atomic regions: {}\n",
        regions
            .iter()
            .map(|r| format!("{} [{}..{}]", r.kind, r.start, r.end))
            .collect::<Vec<_>>()
            .join(", ")
    );

    // Semantic: one chunk per top-level section, any size.
    let semantic = SemanticChunker::new(1);
    show("Semantic (level 1)", &semantic, document);

    // Fixed: size-bounded windows, boundary-aware, table kept whole.
    let fixed = FixedChunker::new(200, regions.clone());
    show("Fixed (200 bytes)", &fixed, document);

    // Hybrid: sections first, size bound second. The default.
    let hybrid = HybridChunker::new(1, 200, regions);
    show("Hybrid (level 1, 200 bytes)", &hybrid, document);
}

fn show(name: &str, chunker: &dyn Chunker, text: &str) {
    let chunks = chunker.chunk(text);
    println!("{name}: {} chunks", chunks.len());
    for chunk in &chunks {
        let preview: String = chunk.text.chars().take(40).collect();
        println!(
            "  [{}] {:>4} bytes  path=[{}]  {preview:?}",
            chunk.index,
            chunk.len(),
            chunk.path_string()
        );
    }
    println!();
}
