use super::*;
use crate::{
    mark::PROVISIONAL_PASS,
    mock::{MockTable, Op},
};
use anyhow::Result;
use maplit::btreemap;
use std::{net::IpAddr, sync::Arc};

const NODE_IP: &str = "192.0.2.10";
const VERSION: &str = "1700000000000000001";

#[derive(Clone, Debug, Default)]
struct StaticPods(LocalPods);

impl LocalPodSource for StaticPods {
    fn local_pods(&self, _: IpAddr) -> Result<LocalPods> {
        Ok(self.0.clone())
    }
}

fn mk_pod(ns: &str, name: &str, ip: &str) -> PodSnapshot {
    PodSnapshot {
        ip: ip.parse().unwrap(),
        name: name.to_string(),
        namespace: ns.to_string(),
        labels: btreemap! { "app".to_string() => name.to_string() },
    }
}

fn mk_table() -> Arc<MockTable> {
    let chains = ChainConfig::default();
    Arc::new(MockTable::with_chains(
        FILTER_TABLE,
        [
            chains.input.as_str(),
            chains.forward.as_str(),
            chains.output.as_str(),
        ],
    ))
}

fn mk_firewall(
    table: &Arc<MockTable>,
    pods: impl IntoIterator<Item = PodSnapshot>,
) -> PodFirewall<Arc<MockTable>, StaticPods> {
    let pods = pods.into_iter().map(|p| (p.ip, p)).collect();
    PodFirewall::new(table.clone(), StaticPods(pods), NODE_IP.parse().unwrap())
}

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

fn chain_rules(table: &MockTable, chain: &ChainName) -> Vec<RuleSpec> {
    table
        .rules(FILTER_TABLE, chain.as_str())
        .expect("chain must exist")
}

fn jumps_to(rules: &[RuleSpec], target: &str) -> usize {
    rules.iter().filter(|r| r.target() == Some(target)).count()
}

#[test]
fn unselected_pod_uses_default_chains() {
    let table = mk_table();
    let pod = mk_pod("ns-0", "pod-0", "10.1.1.5");
    let fw = mk_firewall(&table, [pod.clone()]);

    let other = PolicySnapshot::new("ns-0", "other", [ip("10.1.1.6")], VERSION);
    let active = fw.sync(&[other.clone()], VERSION).unwrap();

    let chain = pod_chain_name("ns-0", "pod-0", VERSION);
    assert!(active.contains(chain.as_str()));
    assert_eq!(active.len(), 1);

    let rules = chain_rules(&table, &chain);
    let defaults = ChainConfig::default();
    assert_eq!(jumps_to(&rules, defaults.default_ingress.as_str()), 1);
    assert_eq!(jumps_to(&rules, defaults.default_egress.as_str()), 1);
    assert_eq!(jumps_to(&rules, other.chain.as_str()), 0);
}

#[test]
fn selected_pod_jumps_to_each_policy() {
    let table = mk_table();
    let pod = mk_pod("ns-0", "pod-0", "10.1.1.5");
    let fw = mk_firewall(&table, [pod.clone()]);

    let policies = (0..3)
        .map(|i| {
            PolicySnapshot::new("ns-0", format!("policy-{i}"), [pod.ip], VERSION)
                .with_policy_type(PolicyType::Ingress)
        })
        .collect::<Vec<_>>();
    fw.sync(&policies, VERSION).unwrap();

    let rules = chain_rules(&table, &pod_chain_name("ns-0", "pod-0", VERSION));
    for policy in &policies {
        assert_eq!(
            jumps_to(&rules, policy.chain.as_str()),
            1,
            "{} must be jumped to exactly once",
            policy.name
        );
    }
    let policy_jumps = rules
        .iter()
        .filter(|r| {
            r.target()
                .map_or(false, |t| policies.iter().any(|p| p.chain.as_str() == t))
        })
        .count();
    assert_eq!(policy_jumps, 3);

    let defaults = ChainConfig::default();
    assert_eq!(jumps_to(&rules, defaults.default_ingress.as_str()), 0);
    // None of the policies govern egress.
    assert_eq!(jumps_to(&rules, defaults.default_egress.as_str()), 1);
}

#[test]
fn policies_for_both_directions_are_jumped_to_once() {
    let table = mk_table();
    let pod = mk_pod("ns-0", "pod-0", "10.1.1.5");
    let fw = mk_firewall(&table, [pod.clone()]);

    let policy = PolicySnapshot::new("ns-0", "allow-web", [pod.ip], VERSION);
    fw.sync(&[policy.clone()], VERSION).unwrap();

    let rules = chain_rules(&table, &pod_chain_name("ns-0", "pod-0", VERSION));
    let defaults = ChainConfig::default();
    assert_eq!(jumps_to(&rules, policy.chain.as_str()), 1);
    assert_eq!(jumps_to(&rules, defaults.default_ingress.as_str()), 0);
    assert_eq!(jumps_to(&rules, defaults.default_egress.as_str()), 0);
}

#[test]
fn egress_only_policy_leaves_ingress_default() {
    let table = mk_table();
    let pod = mk_pod("ns-0", "pod-0", "10.1.1.5");
    let fw = mk_firewall(&table, [pod.clone()]);

    let policy = PolicySnapshot::new("ns-0", "deny-egress", [pod.ip], VERSION)
        .with_policy_type(PolicyType::Egress);
    fw.sync(&[policy.clone()], VERSION).unwrap();

    let rules = chain_rules(&table, &pod_chain_name("ns-0", "pod-0", VERSION));
    let defaults = ChainConfig::default();
    assert_eq!(jumps_to(&rules, policy.chain.as_str()), 1);
    assert_eq!(jumps_to(&rules, defaults.default_ingress.as_str()), 1);
    assert_eq!(jumps_to(&rules, defaults.default_egress.as_str()), 0);
}

#[test]
fn sync_is_idempotent() {
    let table = mk_table();
    let pods = [
        mk_pod("ns-0", "pod-0", "10.1.1.5"),
        mk_pod("ns-0", "pod-1", "10.1.1.6"),
        mk_pod("ns-1", "pod-0", "10.1.2.5"),
    ];
    let fw = mk_firewall(&table, pods);
    let policies = vec![
        PolicySnapshot::new("ns-0", "a", [ip("10.1.1.5"), ip("10.1.1.6")], VERSION),
        PolicySnapshot::new("ns-1", "b", [ip("10.1.2.5")], VERSION)
            .with_policy_type(PolicyType::Ingress),
    ];

    let first = fw.sync(&policies, VERSION).unwrap();
    let state = table.snapshot(FILTER_TABLE);
    let mutations = table.mutations();

    let second = fw.sync(&policies, VERSION).unwrap();
    assert_eq!(first, second);
    assert_eq!(table.snapshot(FILTER_TABLE), state);

    // The second pass only re-creates (and tolerates) the existing pod chains.
    assert_eq!(table.mutations(), mutations + 3);

    for rules in state.values() {
        let unique = rules.iter().collect::<std::collections::HashSet<_>>();
        assert_eq!(unique.len(), rules.len(), "duplicate rules: {rules:#?}");
    }
}

#[test]
fn interception_is_symmetric() {
    let table = mk_table();
    let pod = mk_pod("ns-0", "pod-0", "10.1.1.5");
    let fw = mk_firewall(&table, [pod.clone()]);
    fw.sync(&[], VERSION).unwrap();

    let chain = pod_chain_name("ns-0", "pod-0", VERSION);
    let defaults = ChainConfig::default();
    let dst = ["-d".to_string(), "10.1.1.5".to_string()];
    let src = ["-s".to_string(), "10.1.1.5".to_string()];
    let has = |global: &ChainName, matcher: &[String]| {
        chain_rules(&table, global).iter().any(|r| {
            r.target() == Some(chain.as_str())
                && r.args().windows(2).any(|w| w == matcher)
                && !r.args().iter().any(|a| a == "physdev")
        })
    };

    assert!(has(&defaults.forward, &dst[..]));
    assert!(has(&defaults.output, &dst[..]));
    assert!(!has(&defaults.input, &dst[..]));

    assert!(has(&defaults.input, &src[..]));
    assert!(has(&defaults.forward, &src[..]));
    assert!(has(&defaults.output, &src[..]));

    let bridged = chain_rules(&table, &defaults.forward)
        .into_iter()
        .filter(|r| r.args().iter().any(|a| a == "--physdev-is-bridged"))
        .count();
    assert_eq!(bridged, 2);
}

#[test]
fn interception_is_installed_once_across_passes() {
    let table = mk_table();
    let fw = mk_firewall(&table, [mk_pod("ns-0", "pod-0", "10.1.1.5")]);
    for _ in 0..3 {
        fw.sync(&[], VERSION).unwrap();
    }

    let defaults = ChainConfig::default();
    assert_eq!(chain_rules(&table, &defaults.input).len(), 1);
    assert_eq!(chain_rules(&table, &defaults.forward).len(), 4);
    assert_eq!(chain_rules(&table, &defaults.output).len(), 2);
}

/// Walks a pod chain with a new, non-local packet that no policy chain marked, and returns the
/// actions it triggers. Policy and default chains return such a packet unmarked.
fn evaluate_unmarked(rules: &[RuleSpec]) -> Vec<&'static str> {
    let mut actions = vec![];
    for rule in rules {
        let args = rule.args();
        if args.iter().any(|a| a == "conntrack" || a == "addrtype") {
            continue;
        }
        match rule.target() {
            Some("NFLOG") => actions.push("log"),
            Some("REJECT") => {
                actions.push("reject");
                return actions;
            }
            Some("MARK") => actions.push("mark"),
            _ => {}
        }
    }
    actions
}

#[test]
fn unmarked_traffic_is_logged_then_rejected() {
    let table = mk_table();
    let pod = mk_pod("ns-0", "pod-0", "10.1.1.5");
    let fw = mk_firewall(&table, [pod.clone()]);
    let policy = PolicySnapshot::new("ns-0", "p", [pod.ip], VERSION);
    fw.sync(&[policy], VERSION).unwrap();

    let rules = chain_rules(&table, &pod_chain_name("ns-0", "pod-0", VERSION));
    assert_eq!(evaluate_unmarked(&rules), vec!["log", "reject"]);

    let position = |target: &str| rules.iter().position(|r| r.target() == Some(target));
    let log = position("NFLOG").unwrap();
    let reject = position("REJECT").unwrap();
    let unmarked = ["!".to_string(), "--mark".to_string(), PROVISIONAL_PASS.matcher()];
    for i in [log, reject] {
        assert!(rules[i].args().windows(3).any(|w| w == &unmarked[..]));
    }
    let marks = rules
        .iter()
        .enumerate()
        .filter(|(_, r)| r.target() == Some("MARK"))
        .map(|(i, _)| i)
        .collect::<Vec<_>>();
    assert_eq!(marks.len(), 2);
    assert!(log < reject);
    assert!(marks.iter().all(|m| reject < *m));
    assert_eq!(marks[1], rules.len() - 1);
    assert_eq!(
        rules[marks[0]].args().last().map(String::as_str),
        Some("0/0x10000")
    );
    assert_eq!(
        rules[marks[1]].args().last().map(String::as_str),
        Some("0x20000/0x20000")
    );
}

#[test]
fn drop_tail_is_not_duplicated_on_rerun() {
    let table = mk_table();
    let fw = mk_firewall(&table, [mk_pod("ns-0", "pod-0", "10.1.1.5")]);
    fw.sync(&[], VERSION).unwrap();
    fw.sync(&[], VERSION).unwrap();

    let rules = chain_rules(&table, &pod_chain_name("ns-0", "pod-0", VERSION));
    assert_eq!(jumps_to(&rules, "NFLOG"), 1);
    assert_eq!(jumps_to(&rules, "REJECT"), 1);
    assert_eq!(jumps_to(&rules, "MARK"), 2);
}

#[test]
fn new_generation_builds_new_chains() {
    let table = mk_table();
    let fw = mk_firewall(&table, [mk_pod("ns-0", "pod-0", "10.1.1.5")]);

    let old = fw.sync(&[], "1").unwrap();
    let new = fw.sync(&[], "2").unwrap();
    assert_eq!(old.len(), 1);
    assert_eq!(new.len(), 1);
    assert!(old.iter().all(|c| !new.contains(c.as_str())));

    // Both generations remain until the collector removes the stale one.
    let chains = table.chains(FILTER_TABLE);
    for chain in old.iter().chain(new.iter()) {
        assert!(chains.contains(&chain.to_string()));
    }
}

#[test]
fn existing_pod_chain_is_tolerated() {
    let table = mk_table();
    let chain = pod_chain_name("ns-0", "pod-0", VERSION);
    table.new_chain(FILTER_TABLE, chain.as_str()).unwrap();

    let fw = mk_firewall(&table, [mk_pod("ns-0", "pod-0", "10.1.1.5")]);
    let active = fw.sync(&[], VERSION).unwrap();
    assert!(active.contains(chain.as_str()));
}

#[test]
fn no_local_pods_is_not_an_error() {
    let table = mk_table();
    let fw = mk_firewall(&table, []);
    let active = fw.sync(&[], VERSION).unwrap();
    assert!(active.is_empty());
    assert_eq!(table.mutations(), 0);
}

#[test]
fn failure_aborts_the_pass() {
    let table = mk_table();
    let defaults = ChainConfig::default();
    table.fail_on(Op::Insert, defaults.forward.as_str());

    let fw = mk_firewall(
        &table,
        [
            mk_pod("ns-0", "pod-0", "10.1.1.5"),
            mk_pod("ns-0", "pod-1", "10.1.1.6"),
        ],
    );
    let error = fw.sync(&[], VERSION).unwrap_err();
    let message = format!("{error:#}");
    assert!(message.contains("pod ns-0/pod-0"), "{message}");
    assert!(message.contains("injected failure"), "{message}");

    // The second pod was never reached.
    let second = pod_chain_name("ns-0", "pod-1", VERSION);
    assert!(table.rules(FILTER_TABLE, second.as_str()).is_none());

    // Once the failure clears, the next pass converges.
    table.clear_failure();
    let active = fw.sync(&[], VERSION).unwrap();
    assert_eq!(active.len(), 2);
}

#[test]
fn custom_chain_names_are_used() {
    let table = Arc::new(MockTable::with_chains(
        FILTER_TABLE,
        ["IN", "FWD", "OUT"],
    ));
    let chains = ChainConfig {
        input: "IN".into(),
        forward: "FWD".into(),
        output: "OUT".into(),
        default_ingress: "DEF-IN".into(),
        default_egress: "DEF-OUT".into(),
    };
    let pod = mk_pod("ns-0", "pod-0", "10.1.1.5");
    let fw = PodFirewall::new(
        table.clone(),
        StaticPods(btreemap! { pod.ip => pod }),
        NODE_IP.parse().unwrap(),
    )
    .with_chains(chains)
    .with_drop_log(DropLogConfig {
        nflog_group: 7,
        limit: "1/second".to_string(),
        limit_burst: 3,
    });
    fw.sync(&[], VERSION).unwrap();

    let rules = table
        .rules(FILTER_TABLE, pod_chain_name("ns-0", "pod-0", VERSION).as_str())
        .unwrap();
    assert_eq!(jumps_to(&rules, "DEF-IN"), 1);
    assert_eq!(jumps_to(&rules, "DEF-OUT"), 1);
    let log = rules.iter().find(|r| r.target() == Some("NFLOG")).unwrap();
    assert!(log.to_string().ends_with("--nflog-group 7 -m limit --limit 1/second --limit-burst 3"));
    assert_eq!(table.rules(FILTER_TABLE, "IN").unwrap().len(), 1);
}
