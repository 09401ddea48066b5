// Integration tests follow the organization suggested by Matklad:
// https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

#[cfg(not(miri))]
mod simulation_clock_sync;
mod simulation_control;
mod simulation_equivalence;
mod simulation_ordering;
mod simulation_scenarios;
