#[tokio::main]
async fn main() -> std::process::ExitCode {
    appkey_console::run().await
}
