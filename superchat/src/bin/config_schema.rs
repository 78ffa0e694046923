use schemars::schema_for;

fn main() {
    let schema = schema_for!(superchat_common::config::Config);
    #[allow(clippy::unwrap_used)]
    println!("{}", serde_json::to_string_pretty(&schema).unwrap());
}
