//! Sender frequency statistics from raw `From` headers

use mailparse::MailAddr;
use std::collections::HashMap;

use crate::models::SenderCount;

/// Extract the bare, lowercased address from a raw `From` header value.
///
/// Accepts both `Name <addr>` and bare `addr` forms. When the value holds an
/// address list only the first address is kept (the first member for a
/// group). Returns `None` for values that do not parse to an address.
pub fn parse_sender_address(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        return None;
    }

    let addrs = mailparse::addrparse(raw).ok()?;
    let first = match addrs.iter().next()? {
        MailAddr::Single(info) => info.addr.clone(),
        MailAddr::Group(group) => group.addrs.first()?.addr.clone(),
    };

    let address = first.trim().to_lowercase();
    if address.is_empty() || !address.contains('@') {
        return None;
    }
    Some(address)
}

/// Count messages per normalized sender address.
///
/// Sorted by count descending, ties broken by address ascending.
pub fn count_senders<S>(from_values: &[S]) -> Vec<SenderCount>
where
    S: AsRef<str>,
{
    let mut counts: HashMap<String, usize> = HashMap::new();
    for raw in from_values {
        if let Some(address) = parse_sender_address(raw.as_ref()) {
            *counts.entry(address).or_insert(0) += 1;
        }
    }

    let mut senders: Vec<SenderCount> = counts
        .into_iter()
        .map(|(address, count)| SenderCount { address, count })
        .collect();
    senders.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.address.cmp(&b.address)));
    senders
}
