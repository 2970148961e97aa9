//! C3: directory discovery (spec.md §4.4). Grounded on
//! `original_source/src/bloomd/filter_manager.c`'s `load_existing_filters`
//! / `filter_bloomd_folders`.

use std::collections::HashMap;
use std::sync::Arc;

use filter_engine::BloomFilterEngine;
use walkdir::WalkDir;

use crate::config::Config;
use crate::wrapper::FilterWrapper;

pub const FOLDER_PREFIX: &str = "bloomd.";

/// Scans `config.data_dir` for entries named `bloomd.<name>` and builds a
/// wrapper for each, using the manager default engine config,
/// `discover=true`, `is_hot=false`. A filter that fails to load is logged
/// and skipped; the overall scan always succeeds (returning whatever
/// loaded, possibly empty), matching spec.md §4.4's "overall init still
/// succeeds".
pub fn discover(config: &Config) -> HashMap<String, Arc<FilterWrapper>> {
    let mut index = HashMap::new();

    if !config.data_dir.is_dir() {
        return index;
    }

    let entries = WalkDir::new(&config.data_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir());

    let mut found = 0;
    for entry in entries {
        let folder_name = match entry.file_name().to_str() {
            Some(n) => n,
            None => continue,
        };
        if !folder_name.starts_with(FOLDER_PREFIX) {
            continue;
        }
        let name = &folder_name[FOLDER_PREFIX.len()..];
        if name.is_empty() {
            continue;
        }
        match BloomFilterEngine::init(config.default_engine_config(), name, true) {
            Ok(engine) => {
                index.insert(
                    name.to_owned(),
                    FilterWrapper::new(Box::new(engine), false, false, None),
                );
                found += 1;
            }
            Err(e) => {
                slog_global::warn!("failed to load existing filter"; "name" => name, "error" => %e);
            }
        }
    }
    slog_global::info!("discovered existing filters"; "count" => found);
    index
}
