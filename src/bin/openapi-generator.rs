use potd_back::services::documentation::ApiDoc;
use utoipa::OpenApi;

fn main() {
    match ApiDoc::openapi().to_pretty_json() {
        Ok(document) => println!("{document}"),
        Err(err) => {
            eprintln!("failed to render the OpenAPI document: {err}");
            std::process::exit(1);
        }
    }
}
