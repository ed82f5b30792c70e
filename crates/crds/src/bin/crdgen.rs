//! Prints the CustomResourceDefinition manifests for this workspace.
//!
//! Usage: `cargo run -p crds --bin crdgen > config/crd/weblogicserver.yaml`

use crds::WeblogicServer;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&WeblogicServer::crd())?);
    Ok(())
}
