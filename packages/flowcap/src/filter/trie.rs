//! Binary trie over IPv4 prefixes with longest-match lookup.
//!
//! Nodes live in one arena; children are `u32` indices into it.
//!
//! ```text
//!            root
//!          0/    \1
//!         ..      n ── entry for 128.0.0.0/1
//!               0/
//!               n ── entry for 128.0.0.0/2 (wins over /1)
//! ```

use super::primitive::Verdict;

const ROOT: u32 = 0;

#[derive(Debug, Clone, Default)]
struct Node {
    children: [Option<u32>; 2],
    entry: Option<Verdict>,
}

#[derive(Debug, Clone)]
pub struct PrefixTrie {
    nodes: Vec<Node>,
    entries: usize,
}

impl Default for PrefixTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl PrefixTrie {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::default()],
            entries: 0,
        }
    }

    /// Number of stored prefixes.
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Insert `addr/len`. Host bits past `len` are ignored and lengths above
    /// 32 clamp. An existing entry for the same prefix is kept; returns
    /// `false` in that case.
    pub fn insert(&mut self, addr: u32, len: u8, mode: Verdict) -> bool {
        let len = len.min(32);
        let mut cur = ROOT;
        for depth in 0..len {
            let bit = bit_at(addr, depth);
            cur = match self.nodes[cur as usize].children[bit] {
                Some(next) => next,
                None => {
                    let next = self.nodes.len() as u32;
                    self.nodes.push(Node::default());
                    self.nodes[cur as usize].children[bit] = Some(next);
                    next
                }
            };
        }

        let node = &mut self.nodes[cur as usize];
        if let Some(prev) = node.entry {
            tracing::warn!(
                prefix = %format_prefix(addr, len),
                previous = %prev,
                "prefix previously set"
            );
            return false;
        }
        node.entry = Some(mode);
        self.entries += 1;
        true
    }

    /// Mode of the most specific prefix containing `addr`.
    pub fn lookup(&self, addr: u32) -> Option<Verdict> {
        let mut cur = ROOT;
        let mut best = self.nodes[ROOT as usize].entry;
        for depth in 0..32 {
            match self.nodes[cur as usize].children[bit_at(addr, depth)] {
                Some(next) => {
                    cur = next;
                    if let Some(mode) = self.nodes[cur as usize].entry {
                        best = Some(mode);
                    }
                }
                None => break,
            }
        }
        best
    }
}

#[inline]
fn bit_at(addr: u32, depth: u8) -> usize {
    ((addr >> (31 - depth)) & 1) as usize
}

pub fn format_prefix(addr: u32, len: u8) -> String {
    let masked = if len == 0 {
        0
    } else {
        addr & (u32::MAX << (32 - u32::from(len.min(32))))
    };
    format!("{}/{}", std::net::Ipv4Addr::from(masked), len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(a: u8, b: u8, c: u8, d: u8) -> u32 {
        u32::from_be_bytes([a, b, c, d])
    }

    #[test]
    fn test_empty_trie_misses() {
        let t = PrefixTrie::new();
        assert!(t.is_empty());
        assert_eq!(t.lookup(ip(10, 0, 0, 1)), None);
    }

    #[test]
    fn test_longest_match_wins() {
        let mut t = PrefixTrie::new();
        t.insert(ip(10, 0, 0, 0), 8, Verdict::Permit);
        t.insert(ip(10, 1, 0, 0), 16, Verdict::Deny);
        t.insert(ip(10, 1, 2, 0), 24, Verdict::Permit);

        assert_eq!(t.lookup(ip(10, 9, 9, 9)), Some(Verdict::Permit));
        assert_eq!(t.lookup(ip(10, 1, 9, 9)), Some(Verdict::Deny));
        assert_eq!(t.lookup(ip(10, 1, 2, 3)), Some(Verdict::Permit));
        assert_eq!(t.lookup(ip(11, 0, 0, 0)), None);
    }

    #[test]
    fn test_default_route_and_host() {
        let mut t = PrefixTrie::new();
        t.insert(0, 0, Verdict::Deny);
        t.insert(ip(192, 168, 1, 1), 32, Verdict::Permit);
        assert_eq!(t.lookup(ip(8, 8, 8, 8)), Some(Verdict::Deny));
        assert_eq!(t.lookup(ip(192, 168, 1, 1)), Some(Verdict::Permit));
        assert_eq!(t.lookup(ip(192, 168, 1, 2)), Some(Verdict::Deny));
    }

    #[test]
    fn test_duplicate_keeps_first() {
        let mut t = PrefixTrie::new();
        assert!(t.insert(ip(172, 16, 0, 0), 12, Verdict::Permit));
        assert!(!t.insert(ip(172, 16, 5, 5), 12, Verdict::Deny));
        assert_eq!(t.len(), 1);
        assert_eq!(t.lookup(ip(172, 20, 0, 1)), Some(Verdict::Permit));
    }

    #[test]
    fn test_length_clamps() {
        let mut t = PrefixTrie::new();
        t.insert(ip(1, 2, 3, 4), 40, Verdict::Permit);
        assert_eq!(t.lookup(ip(1, 2, 3, 4)), Some(Verdict::Permit));
        assert_eq!(t.lookup(ip(1, 2, 3, 5)), None);
    }

    #[test]
    fn test_format_prefix_masks_host_bits() {
        assert_eq!(format_prefix(ip(10, 1, 2, 3), 8), "10.0.0.0/8");
        assert_eq!(format_prefix(ip(10, 1, 2, 3), 0), "0.0.0.0/0");
    }
}
