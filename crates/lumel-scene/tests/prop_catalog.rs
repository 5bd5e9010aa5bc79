use lumel_scene::ShaderCatalog;
use proptest::prelude::*;

fn key_set() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("[a-z][a-z0-9_]{0,12}", 1..12)
        .prop_map(|s| s.into_iter().collect())
}

proptest! {
    // Shader id assignment only depends on the key set, never on the
    // order the TOML tables appear in.
    #[test]
    fn ids_independent_of_declaration_order(keys in key_set(), seed in any::<u64>()) {
        let forward: String = keys
            .iter()
            .map(|k| format!("[shaders.{}]\n", k))
            .collect();
        let mut shuffled = keys.clone();
        // Cheap deterministic shuffle.
        let mut state = seed | 1;
        for i in (1..shuffled.len()).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let j = (state >> 33) as usize % (i + 1);
            shuffled.swap(i, j);
        }
        let backward: String = shuffled
            .iter()
            .map(|k| format!("[shaders.{}]\n", k))
            .collect();

        let a = ShaderCatalog::from_toml_str(&forward).unwrap();
        let b = ShaderCatalog::from_toml_str(&backward).unwrap();
        for key in &keys {
            prop_assert_eq!(a.get_id(key), b.get_id(key));
        }
    }
}
