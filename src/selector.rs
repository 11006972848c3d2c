//! Choosing one requirement out of the options a challenge offers.
//!
//! A [`PaymentSelector`] receives every requirement from the `402` body, in
//! server order, together with the client's [`SelectionFilter`], and returns
//! exactly one requirement or fails. Failing is terminal for the request: the
//! interceptor never retries a challenge it could not select from.

use alloy_primitives::U256;

use crate::proto::PaymentRequirements;

/// Constraints the client places on which requirement it is willing to pay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionFilter {
    /// Only pay on this network, e.g. `"base"`.
    pub network: Option<String>,
    /// Only pay with this scheme, e.g. `"exact"`.
    pub scheme: Option<String>,
    /// Spend ceiling in the asset's base units.
    pub max_value: Option<U256>,
}

impl SelectionFilter {
    fn matches(&self, requirement: &PaymentRequirements) -> bool {
        let network_matches = self
            .network
            .as_deref()
            .is_none_or(|network| network == requirement.network);
        let scheme_matches = self
            .scheme
            .as_deref()
            .is_none_or(|scheme| scheme == requirement.scheme);
        network_matches && scheme_matches
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    /// No requirement satisfies the network and scheme filters.
    #[error("No matching payment requirement. Offered: {offered:?}. Filter: {filter:?}")]
    NoMatchingRequirement {
        offered: Vec<(String, String)>,
        filter: SelectionFilter,
    },
    /// Some requirements match the filters, but all of them cost more than the ceiling.
    #[error("Payment amount {requested} exceeds maximum allowed {ceiling}")]
    AmountExceedsCeiling { requested: U256, ceiling: U256 },
    /// Raised by custom selectors.
    #[error("{0}")]
    Custom(String),
}

/// Strategy for picking the requirement to pay.
///
/// Implementations must be deterministic: the same requirements and filter
/// always yield the same choice. Any `Fn` with the right signature is a
/// selector:
///
/// ```rust
/// use x402_interceptor::{PaymentRequirements, SelectionError, SelectionFilter};
///
/// let cheapest = |accepts: &[PaymentRequirements], _: &SelectionFilter| {
///     accepts
///         .iter()
///         .min_by_key(|r| r.amount().ok())
///         .cloned()
///         .ok_or_else(|| SelectionError::Custom("empty".to_string()))
/// };
/// # let _ = cheapest;
/// ```
pub trait PaymentSelector: Send + Sync {
    fn select(
        &self,
        accepts: &[PaymentRequirements],
        filter: &SelectionFilter,
    ) -> Result<PaymentRequirements, SelectionError>;
}

impl<F> PaymentSelector for F
where
    F: Fn(&[PaymentRequirements], &SelectionFilter) -> Result<PaymentRequirements, SelectionError>
        + Send
        + Sync,
{
    fn select(
        &self,
        accepts: &[PaymentRequirements],
        filter: &SelectionFilter,
    ) -> Result<PaymentRequirements, SelectionError> {
        self(accepts, filter)
    }
}

/// First requirement, in server order, that passes the filters and fits under
/// the ceiling.
///
/// When a ceiling is set, requirements whose amount cannot be parsed are
/// skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSelector;

impl PaymentSelector for DefaultSelector {
    fn select(
        &self,
        accepts: &[PaymentRequirements],
        filter: &SelectionFilter,
    ) -> Result<PaymentRequirements, SelectionError> {
        let mut cheapest_rejected: Option<U256> = None;
        for requirement in accepts.iter().filter(|r| filter.matches(r)) {
            let Some(ceiling) = filter.max_value else {
                return Ok(requirement.clone());
            };
            let amount = match requirement.amount() {
                Ok(amount) => amount,
                Err(e) => {
                    tracing::debug!(
                        amount = %requirement.max_amount_required,
                        error = %e,
                        "Skipping requirement with unparseable amount"
                    );
                    continue;
                }
            };
            if amount <= ceiling {
                return Ok(requirement.clone());
            }
            cheapest_rejected = Some(cheapest_rejected.map_or(amount, |c| c.min(amount)));
        }
        match (cheapest_rejected, filter.max_value) {
            (Some(requested), Some(ceiling)) => {
                Err(SelectionError::AmountExceedsCeiling { requested, ceiling })
            }
            _ => Err(SelectionError::NoMatchingRequirement {
                offered: accepts
                    .iter()
                    .map(|r| (r.scheme.clone(), r.network.clone()))
                    .collect(),
                filter: filter.clone(),
            }),
        }
    }
}
