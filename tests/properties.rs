// ABOUTME: Property tests for version allocation and record encoding.
// ABOUTME: Drives the ledger with generated release sequences on the in-memory store.

mod support;

use std::collections::HashMap;
use std::sync::Arc;

use catapult::ledger::{LedgerRecord, ReleaseDraft, ReleaseLedger, ReleaseRecord};
use catapult::store::{MemoryStore, ObjectMeta};
use catapult::types::{AppName, CommitHash, ImageId, ObjectVersionId, ReleaseVersion};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use support::FakeGit;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn app_index() -> impl Strategy<Value = usize> {
    0usize..3
}

fn release_record() -> impl Strategy<Value = ReleaseRecord> {
    (
        1u64..10_000,
        "[a-z]{1,12}@[a-z]{1,8}\\.com",
        "[0-9a-f]{40}",
        proptest::option::of("sha256:[0-9a-f]{16}"),
        ".{0,64}",
        0i64..4_000_000_000,
        any::<bool>(),
    )
        .prop_map(|(version, author, commit, image, changelog, secs, rollback)| {
            ReleaseRecord {
                version: ReleaseVersion::new(version).unwrap(),
                author,
                commit: CommitHash::new(&commit).unwrap(),
                image: image.map(ImageId::new).unwrap_or_else(ImageId::none),
                changelog,
                timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
                rollback,
            }
        })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 32,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: every application's versions run 1..=n in write order,
    /// however releases of different applications interleave.
    #[test]
    fn property_versions_are_dense_per_application(
        sequence in proptest::collection::vec(app_index(), 1..24)
    ) {
        let names = ["alpha", "beta", "gamma"];
        let store = Arc::new(MemoryStore::new("releases"));
        let ledger = ReleaseLedger::new(store, FakeGit::new());
        let draft = ReleaseDraft::default().changelog("generated");

        let mut issued: HashMap<usize, Vec<u64>> = HashMap::new();
        runtime().block_on(async {
            for index in &sequence {
                let app = AppName::new(names[*index]).unwrap();
                let outcome = ledger.create_release(&app, &draft, None).await.unwrap();
                issued.entry(*index).or_default().push(outcome.release.version().get());
            }
        });

        for versions in issued.values() {
            let expected: Vec<u64> = (1..=versions.len() as u64).collect();
            prop_assert_eq!(versions, &expected);
        }
    }

    /// PROPERTY: a record decodes to exactly what was encoded.
    #[test]
    fn property_record_survives_encoding(record in release_record()) {
        let meta = ObjectMeta {
            version_id: ObjectVersionId::new("v1"),
            etag: None,
            last_modified: None,
            is_latest: true,
        };
        let body = record.encode().unwrap();
        let decoded = ReleaseRecord::decode(&body, &meta).unwrap();
        prop_assert_eq!(decoded, record);
    }

    /// PROPERTY: version parsing accepts both spellings and never panics.
    #[test]
    fn property_version_parse_accepts_prefix(n in 1u64..u64::MAX) {
        let plain: ReleaseVersion = n.to_string().parse().unwrap();
        let prefixed: ReleaseVersion = format!("v{n}").parse().unwrap();
        prop_assert_eq!(plain, prefixed);
        prop_assert_eq!(plain.get(), n);
    }

    #[test]
    fn property_version_parse_never_panics(s in ".{0,24}") {
        let _ = s.parse::<ReleaseVersion>();
    }
}
