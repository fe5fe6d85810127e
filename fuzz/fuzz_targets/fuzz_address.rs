//! Fuzz testing for address parsing and policy construction.
//!
//! Parsing and policy building must never panic, whatever the input. A parsed
//! address must survive a trip through its canonical text form, and a policy
//! that builds successfully must admit its own network address.
//!
//! ```bash
//! cargo +nightly fuzz run fuzz_address
//! cargo +nightly fuzz run fuzz_address -- -max_total_time=60
//! ```

#![no_main]

use arbitrary::Arbitrary;
use ip_whitelist::{Address, PolicyConfig};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    client: &'a str,
    network_address: Option<&'a str>,
    mask_bits: Option<u8>,
    allow_list: Vec<&'a str>,
}

fuzz_target!(|input: Input<'_>| {
    if let Ok(address) = Address::parse(input.client) {
        let canonical = address.to_string();
        assert_eq!(Address::parse(&canonical), Ok(address));
    }

    let config = PolicyConfig {
        network_address: input.network_address.map(str::to_string),
        mask_bits: input.mask_bits,
        allow_list: input.allow_list.iter().map(|s| s.to_string()).collect(),
        ..PolicyConfig::default()
    };

    if let Ok(policy) = config.build()
        && let Some(rule) = policy.subnet_rule()
    {
        assert!(policy.matches(&rule.network()));
    }
});
