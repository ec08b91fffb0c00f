use std::error::Error;

use hf_explorer::apps::run_dashboard;

fn main() -> Result<(), Box<dyn Error>> {
    run_dashboard(std::env::args().skip(1))
}
