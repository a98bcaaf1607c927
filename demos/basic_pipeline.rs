//! Basic Pipeline Run
//!
//! The minimal example: raw extracted markdown in, metadata-prefixed
//! chunks out.
//!
//! ```bash
//! cargo run --example basic_pipeline
//! ```

use strata::pipeline::{run, ChunkRequest};

fn main() -> Result<(), strata::Error> {
    // Typical extractor output: literal \n escapes, a page number, and
    // flattened structure.
    let document = "# User Guide\\n\\nThis manual covers installation and daily use.\\n\
                    12\\n\\n# Installation\\n\\nDownload the package and run the installer. \
                    Follow the prompts until setup completes.\\n\\n# Daily Use\\n\\nStart the \
                    program from the launcher. Recent files appear on the left.";

    let request = ChunkRequest {
        file_title: Some("user-guide.pdf".to_string()),
        ..ChunkRequest::new(document)
    };

    let chunks = run(&request)?;

    println!("Document: {} chars", document.len());
    println!("Chunks: {}\n", chunks.len());

    for (i, chunk) in chunks.iter().enumerate() {
        println!("--- chunk {i} ---\n{chunk}\n");
    }

    // Each chunk now carries its document title and heading path, ready
    // for embedding.
    Ok(())
}
