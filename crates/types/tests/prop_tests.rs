use proptest::prelude::*;

use laminar_types::{Block, Commit, Data, Header, NamespaceId, State, Version};

proptest! {
    /// NamespaceId hex round trip: parse(to_string) is the identity.
    #[test]
    fn namespace_id_hex_roundtrip(bytes in prop::array::uniform8(0u8..)) {
        let ns = NamespaceId(bytes);
        let parsed: NamespaceId = ns.to_string().parse().unwrap();
        prop_assert_eq!(parsed, ns);
    }

    /// Header hashing is a pure function of the header contents.
    #[test]
    fn header_hash_deterministic(height in 1u64..u64::MAX, app_hash in prop::array::uniform32(0u8..)) {
        let header = Header {
            version: Version { block: 1, app: 1 },
            height,
            app_hash,
            ..Default::default()
        };
        prop_assert_eq!(header.hash(), header.clone().hash());
    }

    /// Block borsh round trip through the canonical DA blob encoding.
    #[test]
    fn block_encoding_roundtrip(
        height in 1u64..u64::MAX,
        txs in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..8),
    ) {
        let data = Data { txs, intermediate_state_roots: vec![], evidence: vec![] };
        let block = Block {
            header: Header { height, data_hash: data.hash(), ..Default::default() },
            data,
            last_commit: Commit::default(),
        };
        let blob = block.encode().unwrap();
        prop_assert_eq!(Block::decode(&blob).unwrap(), block);
    }

    /// State snapshot round trip.
    #[test]
    fn state_encoding_roundtrip(
        last_block_height in any::<u64>(),
        da_height in any::<u64>(),
        app_hash in prop::array::uniform32(0u8..),
    ) {
        let state = State {
            last_block_height,
            last_block_hash: [0u8; 32],
            app_hash,
            last_results_hash: [0u8; 32],
            da_height,
        };
        let bytes = state.encode().unwrap();
        prop_assert_eq!(State::decode(&bytes).unwrap(), state);
    }

    /// A commit over a header validates iff height and hash both match.
    #[test]
    fn commit_validation(height in 1u64..u64::MAX, other_height in 1u64..u64::MAX) {
        let header = Header { height, ..Default::default() };
        let commit = Commit {
            height: other_height,
            header_hash: header.hash(),
            signatures: vec![vec![0u8; 64]],
        };
        prop_assert_eq!(commit.validate(&header).is_ok(), height == other_height);
    }
}
