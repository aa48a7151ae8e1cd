#![no_main]
use gr1_ir::specification::{GrSpec, Section};
use indexmap::IndexSet;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&selector, rest)) = data.split_first() else {
        return;
    };
    let Ok(s) = std::str::from_utf8(rest) else {
        return;
    };
    let Ok(mut spec) = GrSpec::new(["park"], ["UAV1"]) else {
        return;
    };
    let section = Section::ALL[selector as usize % Section::ALL.len()];
    if spec.add(section, s).is_ok() {
        let props: IndexSet<String> = ["home", "lot", "obs"].iter().map(|p| p.to_string()).collect();
        let _ = spec.compile(&props);
    }
});
