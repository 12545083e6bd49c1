//! Binary that emits command-line options markdown to stdout.

fn main() {
    print!("{}", olist_insights_cli::render_options_markdown());
}
