use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use yieldledger_accounting::{
    LedgerCommand, PoolValuation, ProportionalLedger, RecordDeposit, RecordWithdrawal,
};
use yieldledger_core::{
    Aggregate, Amount, DomainResult, ExpectedVersion, LedgerId, PrincipalId, UnitId, mul_div,
};

const E18: Amount = 1_000_000_000_000_000_000;

/// Pool priced at 1.1 assets per share.
struct Pool {
    shares: Amount,
}

impl PoolValuation for Pool {
    fn pool_shares(&self) -> DomainResult<Amount> {
        Ok(self.shares)
    }

    fn shares_to_assets(&self, shares: Amount) -> DomainResult<Amount> {
        mul_div(shares, 11, 10)
    }
}

fn seeded_ledger(unit: UnitId, beneficiaries: usize) -> (ProportionalLedger, Vec<PrincipalId>) {
    let mut ledger = ProportionalLedger::empty(LedgerId::new());
    let people: Vec<PrincipalId> = (0..beneficiaries).map(|_| PrincipalId::new()).collect();
    for (i, who) in people.iter().enumerate() {
        let events = ledger
            .handle(&LedgerCommand::RecordDeposit(RecordDeposit {
                unit,
                beneficiary: *who,
                amount: (i as Amount + 1) * E18,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        ledger.commit(ExpectedVersion::Any, &events).unwrap();
    }
    (ledger, people)
}

fn bench_live_balance(c: &mut Criterion) {
    let mut group = c.benchmark_group("live_balance");
    for size in [10usize, 1_000, 10_000] {
        let unit = UnitId::new();
        let (ledger, people) = seeded_ledger(unit, size);
        let pool = Pool {
            shares: ledger.aggregate_principal(unit),
        };
        group.throughput(Throughput::Elements(people.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &people, |b, people| {
            b.iter(|| {
                for who in people {
                    black_box(ledger.live_balance(unit, *who, &pool).unwrap());
                }
            })
        });
    }
    group.finish();
}

fn bench_withdraw_handle_apply(c: &mut Criterion) {
    let unit = UnitId::new();
    let (ledger, people) = seeded_ledger(unit, 1_000);
    let pool = Pool {
        shares: ledger.aggregate_principal(unit),
    };

    c.bench_function("withdraw_handle_apply", |b| {
        b.iter_batched(
            || ledger.clone(),
            |mut ledger| {
                for who in &people {
                    let live = ledger.live_balance(unit, *who, &pool).unwrap();
                    let events = ledger
                        .handle(&LedgerCommand::RecordWithdrawal(RecordWithdrawal {
                            unit,
                            beneficiary: *who,
                            requested: live / 2,
                            live_balance: live,
                            pool_shares: pool.shares,
                            occurred_at: Utc::now(),
                        }))
                        .unwrap();
                    ledger.commit(ExpectedVersion::Any, &events).unwrap();
                }
                black_box(ledger)
            },
            criterion::BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_live_balance, bench_withdraw_handle_apply);
criterion_main!(benches);
