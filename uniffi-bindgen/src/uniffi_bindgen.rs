//! Generates foreign bindings for `grantkit-core`.

fn main() {
    uniffi::uniffi_bindgen_main();
}
