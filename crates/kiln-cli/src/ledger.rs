//! File-persisted ledger under the home directory.
//!
//! Layout: `state.cbor` (block height plus every ledger key-value entry), `blobs/` (bytecode by
//! hash), `modules/` (serialized compiled modules) and an optional `config.json`. State is only
//! written back by [`LocalLedger::commit`], so a failed command leaves the home untouched.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context as _, Result};
use kiln_keeper::{Context, Keeper, KeeperConfig, KvBank};
use kiln_store::{DynKv, FsBlobStore, MemKv};
use kiln_wasm::{VmConfig, WasmtimeVm};
use kiln_wasm_abi::BlockInfo;
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

pub const CHAIN_ID: &str = "kiln-local";

const STATE_FILE: &str = "state.cbor";
const CONFIG_FILE: &str = "config.json";
const BLOBS_DIR: &str = "blobs";
const MODULES_DIR: &str = "modules";

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedState {
    height: u64,
    entries: Vec<(ByteBuf, ByteBuf)>,
}

pub struct LocalLedger {
    home: PathBuf,
    height: u64,
    kv: MemKv,
    bank: KvBank,
    keeper: Keeper,
}

impl LocalLedger {
    pub fn open(home: &Path) -> Result<Self> {
        fs::create_dir_all(home)
            .with_context(|| format!("create home directory {}", home.display()))?;
        let state = load_state(&home.join(STATE_FILE))?;
        let kv = MemKv::from_entries(
            state
                .entries
                .into_iter()
                .map(|(key, value)| (key.into_vec(), value.into_vec()))
                .collect(),
        );
        let store: DynKv = Arc::new(kv.clone());
        let bank = KvBank::new(store.clone());

        let blobs = FsBlobStore::open(home.join(BLOBS_DIR)).context("open blob store")?;
        let vm = WasmtimeVm::with_config(
            Arc::new(blobs),
            VmConfig {
                module_cache_dir: Some(home.join(MODULES_DIR)),
                ..VmConfig::default()
            },
        )
        .context("start wasm runtime")?;
        let keeper = Keeper::new(
            store,
            Arc::new(vm),
            Arc::new(bank.clone()),
            Arc::new(bank.clone()),
            load_config(home)?,
        )
        .context("create keeper")?;

        Ok(Self {
            home: home.to_path_buf(),
            height: state.height,
            kv,
            bank,
            keeper,
        })
    }

    pub fn keeper(&self) -> &Keeper {
        &self.keeper
    }

    pub fn bank(&self) -> &KvBank {
        &self.bank
    }

    pub fn is_empty(&self) -> bool {
        self.kv.is_empty()
    }

    /// Context for the next block.
    pub fn context(&self, gas_limit: u64) -> Context {
        let time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        Context::new(
            BlockInfo {
                height: self.height + 1,
                time,
                chain_id: CHAIN_ID.to_string(),
            },
            gas_limit,
        )
    }

    /// Close the block and persist every entry.
    pub fn commit(mut self) -> Result<()> {
        self.height += 1;
        let state = PersistedState {
            height: self.height,
            entries: self
                .kv
                .entries()
                .into_iter()
                .map(|(key, value)| (ByteBuf::from(key), ByteBuf::from(value)))
                .collect(),
        };
        let bytes = kiln_cbor::to_canonical_cbor(&state).context("encode ledger state")?;
        let path = self.home.join(STATE_FILE);
        let tmp = path.with_extension("cbor.tmp");
        fs::write(&tmp, bytes).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("replace {}", path.display()))?;
        Ok(())
    }
}

fn load_state(path: &Path) -> Result<PersistedState> {
    if !path.exists() {
        return Ok(PersistedState::default());
    }
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    kiln_cbor::from_cbor(&bytes).with_context(|| format!("decode {}", path.display()))
}

/// `config.json` in the home directory wins over `KILN_*` environment variables.
fn load_config(home: &Path) -> Result<KeeperConfig> {
    let path = home.join(CONFIG_FILE);
    if !path.exists() {
        return KeeperConfig::from_env().context("load config from environment");
    }
    let text = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let config: KeeperConfig =
        serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))?;
    config.validate().context("validate config")?;
    Ok(config)
}
