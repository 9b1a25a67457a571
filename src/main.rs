use clap::Parser;
use twiml_test_kit::cli::{apply_overrides, run_call, run_inspect, CallSteps, Cli};
use twiml_test_kit::config::KitConfig;

fn main() {
    let cli = Cli::parse();

    let result = match cli {
        Cli::Call {
            path,
            config,
            base_url,
            from,
            to,
            method,
            follow,
            press,
            speak,
            debug,
        } => {
            let steps = CallSteps { follow, press, speak };
            apply_overrides(KitConfig::default(), base_url, from, to, method, debug)
                .and_then(|overrides| run_call(&path, config.as_deref(), overrides, &steps))
        }
        Cli::Inspect { file } => run_inspect(&file),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
