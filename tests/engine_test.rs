//! Unit tests for the raffle state machine.

use raffle::{
    Address, Amount, EntryError, Ledgered, MockCoordinator, OracleError, PayoutError, Raffle,
    RaffleConfig, RaffleError, RaffleEvent, RandomnessProvider, RequestContext, RequestId,
    RoundState,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedReceiver;

const FEE: Amount = 100;
const INTERVAL: u64 = 30;
const T0: u64 = 1_000;

fn addr(n: u8) -> Address {
    Address([n; 20])
}

struct Fixture {
    raffle: Raffle,
    events: UnboundedReceiver<RaffleEvent>,
    bank: Arc<Mutex<Ledgered>>,
}

fn fixture_with(fee: Amount, coordinator: MockCoordinator) -> Fixture {
    let config = RaffleConfig::new(fee, INTERVAL, 500_000, [7u8; 32], 1).unwrap();
    let bank = Arc::new(Mutex::new(Ledgered::new()));
    let (raffle, events) = Raffle::new(config, Box::new(coordinator), Box::new(bank.clone()), T0);
    Fixture {
        raffle,
        events,
        bank,
    }
}

fn fixture() -> Fixture {
    fixture_with(FEE, MockCoordinator::seeded(42))
}

fn drain(events: &mut UnboundedReceiver<RaffleEvent>) -> Vec<RaffleEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[test]
fn test_initializes_open_and_empty() {
    let fx = fixture();
    assert_eq!(fx.raffle.state(), RoundState::Open);
    assert_eq!(fx.raffle.entrance_fee(), FEE);
    assert_eq!(fx.raffle.interval(), INTERVAL);
    assert_eq!(fx.raffle.entrant_count(), 0);
    assert_eq!(fx.raffle.stake_total(), 0);
    assert_eq!(fx.raffle.recent_winner(), None);
    assert_eq!(fx.raffle.last_timestamp(), T0);
}

#[test]
fn test_records_players_and_keeps_stake_invariant() {
    let mut fx = fixture();
    for i in 1..=4 {
        fx.raffle.enter(addr(i), FEE).unwrap();
        assert_eq!(
            fx.raffle.stake_total(),
            FEE * fx.raffle.entrant_count() as Amount
        );
    }
    assert_eq!(fx.raffle.player(0), Some(addr(1)));
    assert_eq!(fx.raffle.player(3), Some(addr(4)));
    assert_eq!(fx.raffle.pool(), 4 * FEE);
    let events = drain(&mut fx.events);
    assert_eq!(events.len(), 4);
    assert_eq!(events[0], RaffleEvent::EntryRecorded(addr(1)));
}

#[test]
fn test_rejects_low_fee_without_mutation() {
    let mut fx = fixture();
    let err = fx.raffle.enter(addr(1), FEE - 1).unwrap_err();
    assert_eq!(
        err,
        RaffleError::Entry(EntryError::FeeTooLow {
            got: FEE - 1,
            need: FEE
        })
    );
    assert_eq!(fx.raffle.entrant_count(), 0);
    assert_eq!(fx.raffle.stake_total(), 0);
    assert_eq!(fx.raffle.pool(), 0);
    assert!(drain(&mut fx.events).is_empty());
}

#[test]
fn test_rejects_entry_while_calculating() {
    let mut fx = fixture();
    fx.raffle.enter(addr(1), FEE).unwrap();
    fx.raffle.perform_upkeep(T0 + INTERVAL).unwrap();
    let err = fx.raffle.enter(addr(2), FEE).unwrap_err();
    assert_eq!(err, RaffleError::Entry(EntryError::RoundNotOpen));
    assert_eq!(fx.raffle.entrant_count(), 1);
}

#[test]
fn test_upkeep_not_needed_on_empty_round() {
    let mut fx = fixture();
    let err = fx.raffle.perform_upkeep(T0 + INTERVAL + 100).unwrap_err();
    assert_eq!(
        err,
        RaffleError::UpkeepNotNeeded {
            state: RoundState::Open,
            stake: 0,
            entrants: 0
        }
    );
    assert_eq!(fx.raffle.state(), RoundState::Open);
    assert_eq!(fx.raffle.status().outstanding_request, None);
    assert!(drain(&mut fx.events).is_empty());
}

#[test]
fn test_upkeep_not_needed_before_interval() {
    let mut fx = fixture();
    fx.raffle.enter(addr(1), FEE).unwrap();
    let err = fx.raffle.perform_upkeep(T0 + INTERVAL - 1).unwrap_err();
    assert!(matches!(err, RaffleError::UpkeepNotNeeded { .. }));
    assert_eq!(fx.raffle.state(), RoundState::Open);
}

#[test]
fn test_unfunded_subscription_blocks_upkeep() {
    let mut coordinator = MockCoordinator::seeded(42);
    coordinator.set_funded(false);
    let mut fx = fixture_with(FEE, coordinator);
    fx.raffle.enter(addr(1), FEE).unwrap();
    assert!(!fx.raffle.check_upkeep(T0 + INTERVAL).has_funding);
    let err = fx.raffle.perform_upkeep(T0 + INTERVAL).unwrap_err();
    assert!(matches!(err, RaffleError::UpkeepNotNeeded { .. }));
}

#[test]
fn test_perform_upkeep_closes_round_and_issues_request() {
    let mut fx = fixture();
    fx.raffle.enter(addr(1), FEE).unwrap();
    let id = fx.raffle.perform_upkeep(T0 + INTERVAL).unwrap();
    assert!(!id.is_nil());
    assert_eq!(fx.raffle.state(), RoundState::Closing);
    assert_eq!(fx.raffle.status().outstanding_request, Some(id));

    let events = drain(&mut fx.events);
    assert_eq!(
        events,
        vec![
            RaffleEvent::EntryRecorded(addr(1)),
            RaffleEvent::ClosingRequested(id)
        ]
    );

    // Only one request may be outstanding.
    let err = fx.raffle.perform_upkeep(T0 + INTERVAL + 1).unwrap_err();
    assert_eq!(err, RaffleError::AlreadyClosing);
}

struct FlakyProvider {
    up: Arc<AtomicBool>,
    next: u64,
}

impl RandomnessProvider for FlakyProvider {
    fn request(&mut self, _ctx: &RequestContext) -> Result<RequestId, OracleError> {
        if !self.up.load(Ordering::SeqCst) {
            return Err(OracleError::ProviderUnavailable("offline".into()));
        }
        self.next += 1;
        Ok(RequestId(self.next))
    }

    fn is_funded(&self) -> bool {
        true
    }
}

#[test]
fn test_provider_outage_keeps_round_open_and_retriable() {
    let up = Arc::new(AtomicBool::new(false));
    let provider = FlakyProvider {
        up: up.clone(),
        next: 0,
    };
    let config = RaffleConfig::new(FEE, INTERVAL, 500_000, [7u8; 32], 1).unwrap();
    let (mut raffle, _events) =
        Raffle::new(config, Box::new(provider), Box::new(Ledgered::new()), T0);

    raffle.enter(addr(1), FEE).unwrap();
    let err = raffle.perform_upkeep(T0 + INTERVAL).unwrap_err();
    assert!(matches!(
        err,
        RaffleError::Oracle(OracleError::ProviderUnavailable(_))
    ));
    // No transition, no outstanding request; entry and retry still work.
    assert_eq!(raffle.state(), RoundState::Open);
    assert_eq!(raffle.status().outstanding_request, None);
    raffle.enter(addr(2), FEE).unwrap();

    up.store(true, Ordering::SeqCst);
    let id = raffle.perform_upkeep(T0 + INTERVAL).unwrap();
    assert_eq!(id, RequestId(1));
    assert_eq!(raffle.state(), RoundState::Closing);
}

#[test]
fn test_fulfill_without_request_is_unknown() {
    let mut fx = fixture();
    fx.raffle.enter(addr(1), FEE).unwrap();
    let err = fx
        .raffle
        .fulfill_randomness(RequestId(123), 0, T0 + 1)
        .unwrap_err();
    assert_eq!(err, RaffleError::Oracle(OracleError::UnknownRequest(RequestId(123))));
    assert_eq!(fx.raffle.state(), RoundState::Open);
}

#[test]
fn test_wrong_id_leaves_outstanding_request_intact() {
    let mut fx = fixture();
    fx.raffle.enter(addr(1), FEE).unwrap();
    let id = fx.raffle.perform_upkeep(T0 + INTERVAL).unwrap();

    let bogus = RequestId(id.0 ^ 1);
    let err = fx.raffle.fulfill_randomness(bogus, 0, T0 + INTERVAL).unwrap_err();
    assert_eq!(err, RaffleError::Oracle(OracleError::UnknownRequest(bogus)));
    assert_eq!(fx.raffle.status().outstanding_request, Some(id));

    // The legitimate callback still resolves.
    let winner = fx.raffle.fulfill_randomness(id, 0, T0 + INTERVAL).unwrap();
    assert_eq!(winner, addr(1));
}

#[test]
fn test_picks_winner_pays_and_resets() {
    // Entrance fee 1; four entries with one address entering twice.
    let mut fx = fixture_with(1, MockCoordinator::seeded(42));
    fx.raffle.enter(addr(1), 1).unwrap();
    fx.raffle.enter(addr(2), 1).unwrap();
    fx.raffle.enter(addr(2), 1).unwrap();
    fx.raffle.enter(addr(3), 1).unwrap();
    assert_eq!(fx.raffle.stake_total(), 4);

    let id = fx.raffle.perform_upkeep(T0 + INTERVAL).unwrap();
    let resolved_at = T0 + INTERVAL + 5;
    // random value 5, 4 entrants: index 1 wins.
    let winner = fx.raffle.fulfill_randomness(id, 5, resolved_at).unwrap();
    assert_eq!(winner, addr(2));

    let bank = fx.bank.lock().unwrap();
    assert_eq!(bank.balance(addr(2)), 4);
    drop(bank);

    assert_eq!(fx.raffle.state(), RoundState::Open);
    assert_eq!(fx.raffle.entrant_count(), 0);
    assert_eq!(fx.raffle.stake_total(), 0);
    assert_eq!(fx.raffle.pool(), 0);
    assert_eq!(fx.raffle.recent_winner(), Some(addr(2)));
    assert_eq!(fx.raffle.last_timestamp(), resolved_at);

    let events = drain(&mut fx.events);
    assert_eq!(events.last(), Some(&RaffleEvent::WinnerPicked(addr(2))));
}

#[test]
fn test_duplicate_fulfillment_rejected_and_paid_once() {
    let mut fx = fixture();
    fx.raffle.enter(addr(1), FEE).unwrap();
    fx.raffle.enter(addr(2), FEE).unwrap();
    let id = fx.raffle.perform_upkeep(T0 + INTERVAL).unwrap();

    let winner = fx.raffle.fulfill_randomness(id, 2, T0 + INTERVAL).unwrap();
    assert_eq!(winner, addr(1));

    // Provider redelivers the same callback.
    let err = fx.raffle.fulfill_randomness(id, 2, T0 + INTERVAL).unwrap_err();
    assert_eq!(err, RaffleError::Oracle(OracleError::UnknownRequest(id)));

    let bank = fx.bank.lock().unwrap();
    assert_eq!(bank.balance(addr(1)), 2 * FEE);
}

#[test]
fn test_winner_selection_is_deterministic() {
    for random_value in [0u64, 1, 2, 3, 5, 9, u64::MAX] {
        let mut fx = fixture();
        let entrants = [addr(1), addr(2), addr(3), addr(4)];
        for e in entrants {
            fx.raffle.enter(e, FEE).unwrap();
        }
        let id = fx.raffle.perform_upkeep(T0 + INTERVAL).unwrap();
        let winner = fx
            .raffle
            .fulfill_randomness(id, random_value, T0 + INTERVAL)
            .unwrap();
        assert_eq!(winner, entrants[(random_value % 4) as usize]);
    }
}

#[test]
fn test_failed_payout_keeps_round_closed() {
    let mut fx = fixture();
    fx.raffle.enter(addr(1), FEE).unwrap();
    fx.raffle.enter(addr(2), FEE).unwrap();
    // random value 0 selects entrants[0]; make that recipient reject.
    fx.bank.lock().unwrap().refuse(addr(1));

    let id = fx.raffle.perform_upkeep(T0 + INTERVAL).unwrap();
    drain(&mut fx.events);

    let err = fx.raffle.fulfill_randomness(id, 0, T0 + INTERVAL).unwrap_err();
    assert_eq!(
        err,
        RaffleError::Payout(PayoutError::TransferFailed(addr(1)))
    );

    // Fail-closed: round stuck in Closing, nothing moved, no event.
    assert_eq!(fx.raffle.state(), RoundState::Closing);
    assert_eq!(fx.raffle.stake_total(), 2 * FEE);
    assert_eq!(fx.raffle.entrant_count(), 2);
    assert_eq!(fx.raffle.pool(), 2 * FEE);
    assert_eq!(fx.raffle.recent_winner(), None);
    assert!(drain(&mut fx.events).is_empty());

    // Entry is still rejected and the consumed request cannot be replayed.
    assert_eq!(
        fx.raffle.enter(addr(3), FEE).unwrap_err(),
        RaffleError::Entry(EntryError::RoundNotOpen)
    );
    assert_eq!(
        fx.raffle.fulfill_randomness(id, 0, T0 + INTERVAL).unwrap_err(),
        RaffleError::Oracle(OracleError::UnknownRequest(id))
    );
}
