//! `hpt colors` command - Print the marker color scheme

use console::style;
use miette::Result;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::cli::helpers::format_rgb;
use crate::cli::output::print_structured;
use crate::cli::GlobalOpts;
use crate::core::color::color_legend;

#[derive(Tabled)]
struct ColorRow {
    #[tabled(rename = "MATCH")]
    token: &'static str,
    #[tabled(rename = "PART")]
    label: &'static str,
    #[tabled(rename = "RGB")]
    rgb: String,
}

pub fn run(global: &GlobalOpts) -> Result<()> {
    let legend = color_legend();
    if print_structured(&legend, global.format)? {
        return Ok(());
    }

    let rows: Vec<ColorRow> = legend
        .iter()
        .map(|rule| ColorRow {
            token: rule.token,
            label: rule.label,
            rgb: format_rgb(rule.rgb),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()).to_string());
    println!(
        "{}",
        style("First match wins; names are compared case-insensitively.").dim()
    );
    Ok(())
}
