//! # Quire CLI
//!
//! Usage:
//!   quire report.json --rows rows.json -o pages.json
//!   echo '{ ... }' | quire --rows rows.json
//!   quire --example > report.json
//!   quire --example-rows > rows.json
//!
//! Set `RUST_LOG=quire=debug` to trace the fill.

use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--example") {
        print!("{}", example_report_json());
        return;
    }
    if args.iter().any(|a| a == "--example-rows") {
        print!("{}", example_rows_json());
        return;
    }

    // Read the report definition
    let input = if args.len() > 1 && !args[1].starts_with('-') {
        fs::read_to_string(&args[1])
    } else {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).map(|_| buf)
    };
    let input = input.unwrap_or_else(|e| fail(&format!("Failed to read report: {e}")));

    let flag = |name: &str| {
        args.windows(2)
            .find(|w| w[0] == name)
            .map(|w| w[1].clone())
    };

    let rows = match flag("--rows") {
        Some(path) => fs::read_to_string(&path)
            .unwrap_or_else(|e| fail(&format!("Failed to read rows from {path}: {e}"))),
        None => "[]".to_string(),
    };
    let output_path = flag("-o").unwrap_or_else(|| "pages.json".to_string());

    let pages = quire::fill_json(&input, &rows).unwrap_or_else(|e| fail(&format!("{e}")));
    let json = serde_json::to_string_pretty(&pages)
        .unwrap_or_else(|e| fail(&format!("Failed to serialize pages: {e}")));
    if let Err(e) = fs::write(&output_path, json) {
        fail(&format!("Failed to write {output_path}: {e}"));
    }

    let elements: usize = pages.iter().map(|p| p.elements.len()).sum();
    eprintln!(
        "✓ Filled {} pages ({} elements) into {}",
        pages.len(),
        elements,
        output_path
    );
}

fn fail(message: &str) -> ! {
    eprintln!("✗ {message}");
    process::exit(1);
}

fn example_report_json() -> &'static str {
    r##"{
  "name": "orders",
  "page": {
    "size": "A5",
    "margin": { "top": 30, "right": 30, "bottom": 30, "left": 30 }
  },
  "columns": { "count": 2, "spacing": 12 },
  "title": {
    "height": 30,
    "elements": [
      { "x": 0, "y": 0, "width": 300, "height": 30,
        "kind": { "type": "Text", "expression": { "type": "Literal", "value": "Orders by city" }, "lineHeight": 30 } }
    ]
  },
  "pageHeader": {
    "height": 16,
    "elements": [
      { "x": 0, "y": 0, "width": 200, "height": 16,
        "kind": { "type": "Text", "expression": { "type": "Literal", "value": "Quarterly orders" }, "lineHeight": 16 } }
    ]
  },
  "groups": [
    {
      "name": "city",
      "expression": { "type": "Field", "name": "city" },
      "keepTogether": true,
      "reprintHeaderOnEachPage": true,
      "footerPosition": "StackAtBottom",
      "header": { "bands": [
        { "height": 18, "splitType": "Prevent", "elements": [
          { "x": 0, "y": 0, "width": 160, "height": 18,
            "kind": { "type": "Text", "expression": { "type": "Field", "name": "city" }, "lineHeight": 18 } }
        ] }
      ] },
      "footer": { "bands": [
        { "height": 14, "elements": [
          { "x": 0, "y": 0, "width": 160, "height": 14,
            "kind": { "type": "Text", "lineHeight": 14, "expression": { "type": "Concat", "parts": [
              { "type": "Literal", "value": "Total: " },
              { "type": "Variable", "name": "cityTotal" }
            ] } } }
        ] }
      ] }
    }
  ],
  "detail": { "bands": [
    { "height": 14, "elements": [
      { "x": 0, "y": 0, "width": 100, "height": 14,
        "kind": { "type": "Text", "expression": { "type": "Field", "name": "customer" }, "lineHeight": 14 } },
      { "x": 110, "y": 0, "width": 50, "height": 14,
        "kind": { "type": "Text", "expression": { "type": "Field", "name": "amount" }, "lineHeight": 14 } }
    ] }
  ] },
  "pageFooter": {
    "height": 16,
    "elements": [
      { "x": 0, "y": 0, "width": 200, "height": 16,
        "kind": { "type": "Text", "lineHeight": 16, "expression": { "type": "Concat", "parts": [
          { "type": "Literal", "value": "Page " },
          { "type": "Variable", "name": "PAGE_NUMBER" },
          { "type": "Literal", "value": " of " }
        ] } } },
      { "x": 200, "y": 0, "width": 40, "height": 16, "evaluationTime": "Report",
        "kind": { "type": "Text", "expression": { "type": "Variable", "name": "PAGE_NUMBER" }, "lineHeight": 16 } }
    ]
  },
  "summary": {
    "height": 20,
    "elements": [
      { "x": 0, "y": 0, "width": 200, "height": 20,
        "kind": { "type": "Text", "lineHeight": 20, "expression": { "type": "Concat", "parts": [
          { "type": "Literal", "value": "Orders: " },
          { "type": "Variable", "name": "REPORT_COUNT" }
        ] } } }
    ]
  },
  "variables": [
    { "name": "cityTotal", "expression": { "type": "Field", "name": "amount" },
      "calculation": "Sum", "reset": { "Group": "city" } }
  ],
  "whenNoData": "AllSectionsNoDetail"
}
"##
}

fn example_rows_json() -> &'static str {
    r##"[
  { "city": "Lyon", "customer": "Atelier Rhône", "amount": 120 },
  { "city": "Lyon", "customer": "Brasserie Nord", "amount": 80 },
  { "city": "Lyon", "customer": "Croix-Rousse Tissus", "amount": 45 },
  { "city": "Paris", "customer": "Dupont & Fils", "amount": 300 },
  { "city": "Paris", "customer": "Éditions Marais", "amount": 75 },
  { "city": "Toulouse", "customer": "Garonne Aéro", "amount": 510 }
]
"##
}
