fn main() {
    client::app::run_client_app();
}
