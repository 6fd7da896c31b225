//! Rule specifications, expressed as iptables match/target arguments.

use crate::{mark::Mark, ChainName};
use std::{fmt, net::IpAddr};

/// The arguments of a single rule, excluding the table, chain and operation.
///
/// Two specs are the same rule iff their arguments are equal, so builders must always emit
/// matches in the same order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct RuleSpec(Vec<String>);

impl RuleSpec {
    pub fn new() -> Self {
        Self::default()
    }

    fn arg(mut self, arg: impl Into<String>) -> Self {
        self.0.push(arg.into());
        self
    }

    pub fn comment(self, comment: impl Into<String>) -> Self {
        self.arg("-m").arg("comment").arg("--comment").arg(comment)
    }

    pub fn src(self, ip: IpAddr) -> Self {
        self.arg("-s").arg(ip.to_string())
    }

    pub fn dst(self, ip: IpAddr) -> Self {
        self.arg("-d").arg(ip.to_string())
    }

    /// Matches packets that traverse a bridge port rather than being routed.
    pub fn bridged(self) -> Self {
        self.arg("-m").arg("physdev").arg("--physdev-is-bridged")
    }

    /// Matches packets sourced from any address local to the node.
    pub fn src_local(self) -> Self {
        self.arg("-m").arg("addrtype").arg("--src-type").arg("LOCAL")
    }

    pub fn established(self) -> Self {
        self.arg("-m")
            .arg("conntrack")
            .arg("--ctstate")
            .arg("RELATED,ESTABLISHED")
    }

    /// Matches packets that do not carry `mark`.
    pub fn without_mark(self, mark: Mark) -> Self {
        self.arg("-m")
            .arg("mark")
            .arg("!")
            .arg("--mark")
            .arg(mark.matcher())
    }

    pub fn jump(self, target: &ChainName) -> Self {
        self.arg("-j").arg(target.as_str())
    }

    pub fn accept(self) -> Self {
        self.arg("-j").arg("ACCEPT")
    }

    pub fn reject(self) -> Self {
        self.arg("-j").arg("REJECT")
    }

    pub fn nflog(self, group: u16) -> Self {
        self.arg("-j")
            .arg("NFLOG")
            .arg("--nflog-group")
            .arg(group.to_string())
    }

    pub fn limit(self, rate: &str, burst: u32) -> Self {
        self.arg("-m")
            .arg("limit")
            .arg("--limit")
            .arg(rate)
            .arg("--limit-burst")
            .arg(burst.to_string())
    }

    /// Sets the masked bits of the packet mark, e.g. `0/0x10000`.
    pub fn set_mark(self, value_mask: String) -> Self {
        self.arg("-j").arg("MARK").arg("--set-mark").arg(value_mask)
    }

    pub fn args(&self) -> &[String] {
        &self.0
    }

    /// Returns the chain this rule jumps to, if its target is a chain.
    pub fn target(&self) -> Option<&str> {
        let pos = self.0.iter().position(|a| a == "-j")?;
        self.0.get(pos + 1).map(String::as_str)
    }

    pub fn comment_text(&self) -> Option<&str> {
        let pos = self.0.iter().position(|a| a == "--comment")?;
        self.0.get(pos + 1).map(String::as_str)
    }
}

impl fmt::Display for RuleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arg in &self.0 {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            if arg.contains(' ') {
                write!(f, "{arg:?}")?;
            } else {
                f.write_str(arg)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mark::PROVISIONAL_PASS;

    #[test]
    fn renders_reject_rule() {
        let rule = RuleSpec::new()
            .comment("rule to REJECT traffic")
            .without_mark(PROVISIONAL_PASS)
            .reject();
        assert_eq!(
            rule.to_string(),
            r#"-m comment --comment "rule to REJECT traffic" -m mark ! --mark 0x10000/0x10000 -j REJECT"#
        );
        assert_eq!(rule.target(), Some("REJECT"));
        assert_eq!(rule.comment_text(), Some("rule to REJECT traffic"));
    }

    #[test]
    fn argument_order_is_significant() {
        let ip = "10.1.1.5".parse().unwrap();
        let a = RuleSpec::new().dst(ip).comment("x");
        let b = RuleSpec::new().comment("x").dst(ip);
        assert_ne!(a, b);
    }
}
