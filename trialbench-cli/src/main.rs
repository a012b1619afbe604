use colored::Colorize;

fn main() {
    let code = match trialbench_cli::run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", format!("error: {:#}", e).red().bold());
            1
        }
    };
    std::process::exit(code);
}
