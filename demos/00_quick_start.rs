/// quick start - open a loan, run it to the end of its term and close it
use loan_amortization_rs::chrono::{TimeZone, Utc};
use loan_amortization_rs::{LoanParameters, LoanSimulator, Money, SafeTimeProvider, TimeSource};
use rust_decimal_macros::dec;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // controlled clock starting on the opening day
    let time = SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
    let control = time.test_control().unwrap();

    // $12,000 over 12 months at 12% a year
    let params = LoanParameters::declining_principal(Money::from_major(12_000), dec!(0.12), 12);
    let mut loan = LoanSimulator::new("quick-start", &params, &time)?;

    let emi = loan.activate(&time)?;
    println!("loan activated on {}, instalment ${emi}", time.now().format("%Y-%m-%d"));

    // fire every due date and pay what falls due
    while !loan.snapshot(&time)?.principal.is_zero() {
        let next = loan.next_due_amount_calculation(&time)?;
        control.advance(next - time.now());

        if let Some(outcome) = loan.run_due_amount_calculation(&time)? {
            println!(
                "{}: principal ${} interest ${} ({} left)",
                time.now().format("%Y-%m-%d"),
                outcome.principal_due,
                outcome.interest_applied,
                outcome.term.remaining.saturating_sub(1),
            );
        }
        loan.repay_due(&time)?;
    }

    loan.close(&time)?;
    println!("\n{}", loan.snapshot(&time)?.to_json_pretty()?);

    Ok(())
}
