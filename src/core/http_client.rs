use reqwest::Client;

/// `<crate> <version> (<os type>; <os version>)`
pub fn user_agent() -> String {
    let info = os_info::get();
    let os_type = info.os_type();
    let os_version = info.version().to_string();
    let app_name = env!("CARGO_PKG_NAME");
    let app_version = env!("CARGO_PKG_VERSION");
    format!("{} {} ({}; {})", app_name, app_version, os_type, os_version)
}

/// One client per run; deadlines are set per request, not here.
pub fn build_client() -> reqwest::Result<Client> {
    Client::builder().user_agent(user_agent()).build()
}
