//! # Folio CLI
//!
//! Usage:
//!   folio input.xml -o output.pdf
//!   folio input.xml --base assets --config styles.json
//!   cat input.xml | folio -o output.pdf
//!   folio --example > letter.xml
//!
//! Without `-o` the PDF is written to the document's suggested filename
//! (`<filename>`, else `<title>.pdf`), falling back to `output.pdf`.
//! Set `RUST_LOG=folio=debug` to trace the render.

use std::env;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

use serde_json::Value;

use folio::{FolioError, Renderer};

/// Flags that consume the following argument.
const VALUE_FLAGS: [&str; 3] = ["-o", "--base", "--config"];

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();

    if args.iter().any(|a| a == "--example") {
        print!("{}", example_document());
        return;
    }

    if let Err(e) = run(&args) {
        eprintln!("✗ {}", e);
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> Result<(), FolioError> {
    let input_path = positional(args);
    let input = match input_path {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let mut options = match flag_value(args, "--config") {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => Value::Object(Default::default()),
    };
    let base = flag_value(args, "--base").map(str::to_string).or_else(|| {
        input_path
            .and_then(|p| Path::new(p).parent())
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| dir.to_string_lossy().into_owned())
    });
    if let (Some(base), Value::Object(map)) = (base, &mut options) {
        map.entry("basePath").or_insert(Value::String(base));
    }

    let renderer = Renderer::from_markup(&input, &options)?;
    let rendered = renderer.render_pdf()?;

    let output_path = flag_value(args, "-o")
        .map(str::to_string)
        .or_else(|| rendered.filename.clone())
        .unwrap_or_else(|| "output.pdf".to_string());
    fs::write(&output_path, &rendered.bytes)?;
    eprintln!(
        "✓ Written {} bytes to {}",
        rendered.bytes.len(),
        output_path
    );
    Ok(())
}

/// The first argument that is neither a flag nor a flag's value.
fn positional(args: &[String]) -> Option<&str> {
    let mut skip = false;
    for arg in args {
        if skip {
            skip = false;
            continue;
        }
        if VALUE_FLAGS.contains(&arg.as_str()) {
            skip = true;
        } else if !arg.starts_with('-') {
            return Some(arg);
        }
    }
    None
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn example_document() -> &'static str {
    r##"<?xml version="1.0" encoding="UTF-8"?>
<pdf>
    <head>
        <title>Application received</title>
        <meta>
            <author>Passport Office</author>
            <subject>Confirmation letter</subject>
        </meta>
        <styles>
            <label extends="p" font="bold" size="10" marginBottom="1"/>
            <value extends="p" size="12"/>
        </styles>
    </head>
    <page>
        <h1>Application received</h1>
        <p>We have received your application and supporting documents.</p>
        <hr/>
        <row>
            <column width="50%">
                <p style="label">Reference</p>
                <p style="value">1234-5678-9012</p>
            </column>
            <column width="50%">
                <p style="label">Date received</p>
                <p style="value">19 October 2026</p>
            </column>
        </row>
        <h2>What happens next</h2>
        <indent>
            <p>We will contact you if we need more information.
               Most applications are processed within <strong>three weeks</strong>.</p>
        </indent>
        <p>Track your application at <a href="www.example.com/track">our tracking page</a>.</p>
        <p size="10" color="grey">This letter was generated automatically.</p>
    </page>
</pdf>
"##
}
