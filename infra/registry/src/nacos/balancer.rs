//! Weighted random pick among healthy instances.

use super::NacosInstance;
use rand::Rng;

/// Picks one healthy, enabled instance with probability proportional to its
/// weight. Instances with a non-positive weight are never picked.
pub(crate) fn pick(instances: &[NacosInstance]) -> Option<&NacosInstance> {
    pick_with(instances, &mut rand::rng())
}

fn pick_with<'a, R: Rng + ?Sized>(
    instances: &'a [NacosInstance],
    rng: &mut R,
) -> Option<&'a NacosInstance> {
    let candidates: Vec<&NacosInstance> = instances
        .iter()
        .filter(|instance| instance.healthy && instance.enabled && instance.weight > 0.0)
        .collect();

    let total: f64 = candidates.iter().map(|instance| instance.weight).sum();
    if candidates.is_empty() || !total.is_finite() {
        return None;
    }

    let mut point = rng.random::<f64>() * total;
    for candidate in &candidates {
        if point < candidate.weight {
            return Some(candidate);
        }
        point -= candidate.weight;
    }
    candidates.last().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn host(ip: &str, weight: f64, healthy: bool) -> NacosInstance {
        NacosInstance {
            instance_id: format!("{ip}#8080#DEFAULT#DEFAULT_GROUP@@svc"),
            ip: ip.to_owned(),
            port: 8080,
            weight,
            healthy,
            enabled: true,
            service_name: "DEFAULT_GROUP@@svc".to_owned(),
        }
    }

    #[test]
    fn skips_unhealthy_and_weightless() {
        let hosts = [host("10.0.0.1", 1.0, false), host("10.0.0.2", 0.0, true), host("10.0.0.3", 1.0, true)];
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..32 {
            assert_eq!(pick_with(&hosts, &mut rng).map(|h| h.ip.as_str()), Some("10.0.0.3"));
        }
    }

    #[test]
    fn none_without_candidates() {
        assert!(pick(&[]).is_none());
        assert!(pick(&[host("10.0.0.1", 1.0, false)]).is_none());
    }

    #[test]
    fn heavier_hosts_win_more_often() {
        let hosts = [host("10.0.0.1", 1.0, true), host("10.0.0.2", 9.0, true)];
        let mut rng = StdRng::seed_from_u64(42);
        let heavy = (0..1000)
            .filter(|_| pick_with(&hosts, &mut rng).is_some_and(|h| h.ip == "10.0.0.2"))
            .count();
        assert!(heavy > 800, "heavy host picked {heavy} times out of 1000");
    }
}
