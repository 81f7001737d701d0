use std::sync::atomic::{AtomicUsize, Ordering};

/// Built-in IPFS content gateways. The first provider is listed three times to weight it.
pub const DEFAULT_GATEWAYS: [&str; 7] = [
    "http://ipfs-gateway.exorde.network/ipfs/",
    "http://ipfs-gateway.exorde.network/ipfs/",
    "http://ipfs-gateway.exorde.network/ipfs/",
    "https://w3s.link/ipfs/",
    "https://ipfs.io/ipfs/",
    "https://ipfs.eth.aragon.network/ipfs/",
    "https://api.ipfsbrowser.com/ipfs/get.php?hash=",
];

/// Round-robin over content gateway base URLs. [`GatewayRotator::next_gateway`] keeps
/// one position for the whole process; [`GatewayRotator::sequence`] always starts fresh.
#[derive(Debug)]
pub struct GatewayRotator {
    gateways: Vec<String>,
    cursor: AtomicUsize,
}

impl Default for GatewayRotator {
    fn default() -> Self {
        Self::new(DEFAULT_GATEWAYS.iter().map(|g| g.to_string()).collect())
    }
}

impl GatewayRotator {
    /// An empty list falls back to the built-in gateways
    pub fn new(gateways: Vec<String>) -> Self {
        if gateways.is_empty() {
            return Self::default();
        }
        Self {
            gateways,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn gateways(&self) -> &[String] {
        &self.gateways
    }

    pub fn len(&self) -> usize {
        self.gateways.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gateways.is_empty()
    }

    /// Infinite sequence of gateway base URLs, restarting from the first on every call
    pub fn sequence(&self) -> impl Iterator<Item = &str> + '_ {
        self.gateways.iter().map(String::as_str).cycle()
    }

    /// Full content URLs for `cid`, in gateway rotation order
    pub fn content_urls<'a>(&'a self, cid: &'a str) -> impl Iterator<Item = String> + 'a {
        self.sequence().map(move |gateway| format!("{gateway}{cid}"))
    }

    /// The next gateway in the shared rotation. Successive calls from any caller walk
    /// the list in order and wrap around.
    pub fn next_gateway(&self) -> &str {
        let position = self.cursor.fetch_add(1, Ordering::Relaxed);
        &self.gateways[position % self.gateways.len()]
    }

    pub fn next_content_url(&self, cid: &str) -> String {
        format!("{}{cid}", self.next_gateway())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_full_rotations_visit_each_gateway_twice_in_order() {
        let rotator = GatewayRotator::default();
        let taken: Vec<&str> = rotator.sequence().take(2 * DEFAULT_GATEWAYS.len()).collect();

        assert_eq!(&taken[..7], &DEFAULT_GATEWAYS[..]);
        assert_eq!(&taken[7..], &DEFAULT_GATEWAYS[..]);
    }

    #[test]
    fn every_sequence_starts_from_the_first_gateway() {
        let rotator = GatewayRotator::new(vec!["https://a/".into(), "https://b/".into()]);
        assert_eq!(rotator.sequence().nth(3), Some("https://b/"));
        assert_eq!(rotator.sequence().next(), Some("https://a/"));
    }

    #[test]
    fn content_urls_append_the_identifier() {
        let rotator = GatewayRotator::default();
        let urls: Vec<String> = rotator.content_urls("QmHash").take(7).collect();

        assert_eq!(urls[0], "http://ipfs-gateway.exorde.network/ipfs/QmHash");
        assert_eq!(urls[6], "https://api.ipfsbrowser.com/ipfs/get.php?hash=QmHash");
    }

    #[test]
    fn empty_list_falls_back_to_defaults() {
        assert_eq!(GatewayRotator::new(Vec::new()).gateways(), &DEFAULT_GATEWAYS[..]);
    }

    #[test]
    fn shared_rotation_continues_where_it_left_off() {
        let rotator = GatewayRotator::new(vec![
            "https://a/".into(),
            "https://b/".into(),
            "https://c/".into(),
        ]);

        assert_eq!(rotator.next_content_url("Qm1"), "https://a/Qm1");
        assert_eq!(rotator.next_content_url("Qm2"), "https://b/Qm2");
        // a fresh sequence does not disturb the shared position
        assert_eq!(rotator.sequence().next(), Some("https://a/"));
        assert_eq!(rotator.next_gateway(), "https://c/");
        assert_eq!(rotator.next_gateway(), "https://a/");
    }
}
