use node_runtime::config::NodeConfig;
use node_runtime::node::Node;
use node_runtime::NetworkType;

fn dev_config(data_dir: &std::path::Path) -> NodeConfig {
    let mut config = NodeConfig::default();
    config.storage.data_dir = data_dir.to_path_buf();
    config.network.network_type = NetworkType::Dev;
    config.network.p2p.listen_addr = None;
    config.mining.miner.worker_threads = 0;
    config
}

#[test]
fn a_fresh_data_dir_bootstraps_at_the_dev_genesis() {
    let dir = tempfile::tempdir().unwrap();
    let node = Node::bootstrap(dev_config(dir.path())).unwrap();
    let stats = node.stats();
    assert_eq!(stats.tip_height, 0);
    assert_eq!(stats.mempool_size, 0);
    assert_eq!(stats.peer_count, 0);
}

#[test]
fn reopening_the_same_data_dir_resumes_from_the_same_tip() {
    let dir = tempfile::tempdir().unwrap();
    let first = Node::bootstrap(dev_config(dir.path())).unwrap();
    let first_hash = first.stats().tip_hash;
    drop(first);

    let second = Node::bootstrap(dev_config(dir.path())).unwrap();
    assert_eq!(second.stats().tip_hash, first_hash);
}

#[test]
fn mining_with_no_configured_address_is_forced_to_zero_worker_threads() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = dev_config(dir.path());
    config.mining.miner.worker_threads = 4;
    config.mining.mining_address = None;
    let text = toml::to_string(&config).unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, text).unwrap();

    let loaded = NodeConfig::from_file(&path).unwrap();
    assert_eq!(loaded.mining.miner.worker_threads, 0);
}
