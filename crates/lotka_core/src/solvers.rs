use crate::traits::{DynamicalSystem, Scalar, Steppable};

fn cst<T: Scalar>(value: f64) -> T {
    T::from_f64(value).unwrap_or_else(T::nan)
}

/// Classic Runge-Kutta 4th Order Solver
pub struct RK4<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> RK4<T> {
    pub fn new(dim: usize) -> Self {
        let z = T::zero();
        Self {
            k1: vec![z; dim],
            k2: vec![z; dim],
            k3: vec![z; dim],
            k4: vec![z; dim],
            tmp: vec![z; dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for RK4<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        let half: T = cst(0.5);
        let sixth: T = cst(1.0 / 6.0);
        let two: T = cst(2.0);

        let t0 = *t;

        // k1 = f(t, y)
        system.apply(t0, state, &mut self.k1);

        // k2 = f(t + dt/2, y + dt*k1/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k1[i] * half;
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k2);

        // k3 = f(t + dt/2, y + dt*k2/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k2[i] * half;
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k3);

        // k4 = f(t + dt, y + dt*k3)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k3[i];
        }
        system.apply(t0 + dt, &self.tmp, &mut self.k4);

        for i in 0..state.len() {
            state[i] = state[i]
                + dt * sixth * (self.k1[i] + two * self.k2[i] + two * self.k3[i] + self.k4[i]);
        }

        *t = t0 + dt;
    }
}

/// Tsitouras 5(4) embedded pair.
///
/// Advances with the 5th order weights and estimates the local error from
/// the difference to the embedded 4th order solution, which needs a seventh
/// stage evaluated at the new point.
pub struct Tsit5<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    k5: Vec<T>,
    k6: Vec<T>,
    k7: Vec<T>,
    tmp: Vec<T>,
    candidate: Vec<T>,
    error: Vec<T>,
}

// Nodes
const C2: f64 = 0.161;
const C3: f64 = 0.327;
const C4: f64 = 0.9;
const C5: f64 = 0.9800255409045097;

const A21: f64 = 0.161;

const A31: f64 = -0.008480655492356989;
const A32: f64 = 0.335480655492357;

const A41: f64 = 2.898;
const A42: f64 = -6.359447987781783;
const A43: f64 = 4.361447987781783;

const A51: f64 = 5.325864858437957;
const A52: f64 = -11.748883564062828;
const A53: f64 = 7.495539342889693;
const A54: f64 = -0.09249506636030195;

const A61: f64 = 5.86145544294642;
const A62: f64 = -12.92096931784711;
const A63: f64 = 8.159367898576159;
const A64: f64 = -0.071584973281401;
const A65: f64 = -0.02826857949054663;

// 5th order weights (also the last row of the tableau)
const B1: f64 = 0.09646076681806523;
const B2: f64 = 0.01;
const B3: f64 = 0.4798896504144996;
const B4: f64 = 1.379008574103742;
const B5: f64 = -3.290069515436099;
const B6: f64 = 2.324710524099774;

// Difference between the 5th and embedded 4th order weights
const E1: f64 = -0.00178001105222577714;
const E2: f64 = -0.0008164344596567469;
const E3: f64 = 0.007880878010261995;
const E4: f64 = -0.1447110071732629;
const E5: f64 = 0.5823571654525552;
const E6: f64 = -0.45808210592918697;
const E7: f64 = 0.015151515151515152;

impl<T: Scalar> Tsit5<T> {
    pub fn new(dim: usize) -> Self {
        let z = T::zero();
        Self {
            k1: vec![z; dim],
            k2: vec![z; dim],
            k3: vec![z; dim],
            k4: vec![z; dim],
            k5: vec![z; dim],
            k6: vec![z; dim],
            k7: vec![z; dim],
            tmp: vec![z; dim],
            candidate: vec![z; dim],
            error: vec![z; dim],
        }
    }

    /// Computes a trial step from `(t, state)` without committing it.
    ///
    /// Afterwards [`Tsit5::candidate`] holds the proposed state at `t + dt`
    /// and [`Tsit5::error_estimate`] the per-component local error.
    pub fn attempt(&mut self, system: &impl DynamicalSystem<T>, t: T, state: &[T], dt: T) {
        let n = state.len();

        system.apply(t, state, &mut self.k1);

        for i in 0..n {
            self.tmp[i] = state[i] + dt * (cst::<T>(A21) * self.k1[i]);
        }
        system.apply(t + cst::<T>(C2) * dt, &self.tmp, &mut self.k2);

        for i in 0..n {
            self.tmp[i] =
                state[i] + dt * (cst::<T>(A31) * self.k1[i] + cst::<T>(A32) * self.k2[i]);
        }
        system.apply(t + cst::<T>(C3) * dt, &self.tmp, &mut self.k3);

        for i in 0..n {
            self.tmp[i] = state[i]
                + dt * (cst::<T>(A41) * self.k1[i]
                    + cst::<T>(A42) * self.k2[i]
                    + cst::<T>(A43) * self.k3[i]);
        }
        system.apply(t + cst::<T>(C4) * dt, &self.tmp, &mut self.k4);

        for i in 0..n {
            self.tmp[i] = state[i]
                + dt * (cst::<T>(A51) * self.k1[i]
                    + cst::<T>(A52) * self.k2[i]
                    + cst::<T>(A53) * self.k3[i]
                    + cst::<T>(A54) * self.k4[i]);
        }
        system.apply(t + cst::<T>(C5) * dt, &self.tmp, &mut self.k5);

        for i in 0..n {
            self.tmp[i] = state[i]
                + dt * (cst::<T>(A61) * self.k1[i]
                    + cst::<T>(A62) * self.k2[i]
                    + cst::<T>(A63) * self.k3[i]
                    + cst::<T>(A64) * self.k4[i]
                    + cst::<T>(A65) * self.k5[i]);
        }
        system.apply(t + dt, &self.tmp, &mut self.k6);

        for i in 0..n {
            self.candidate[i] = state[i]
                + dt * (cst::<T>(B1) * self.k1[i]
                    + cst::<T>(B2) * self.k2[i]
                    + cst::<T>(B3) * self.k3[i]
                    + cst::<T>(B4) * self.k4[i]
                    + cst::<T>(B5) * self.k5[i]
                    + cst::<T>(B6) * self.k6[i]);
        }
        system.apply(t + dt, &self.candidate, &mut self.k7);

        for i in 0..n {
            self.error[i] = dt
                * (cst::<T>(E1) * self.k1[i]
                    + cst::<T>(E2) * self.k2[i]
                    + cst::<T>(E3) * self.k3[i]
                    + cst::<T>(E4) * self.k4[i]
                    + cst::<T>(E5) * self.k5[i]
                    + cst::<T>(E6) * self.k6[i]
                    + cst::<T>(E7) * self.k7[i]);
        }
    }

    pub fn candidate(&self) -> &[T] {
        &self.candidate
    }

    pub fn error_estimate(&self) -> &[T] {
        &self.error
    }

    /// Derivative at the start of the last attempted step.
    pub fn initial_slope(&self) -> &[T] {
        &self.k1
    }
}

impl<T: Scalar> Steppable<T> for Tsit5<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        self.attempt(system, *t, state, dt);
        state.copy_from_slice(&self.candidate[..state.len()]);
        *t = *t + dt;
    }
}

#[cfg(test)]
mod tests {
    use super::{Tsit5, B1, B2, B3, B4, B5, B6, E1, E2, E3, E4, E5, E6, E7, RK4};
    use crate::traits::{DynamicalSystem, Steppable};
    use approx::assert_relative_eq;

    struct Decay {
        rate: f64,
    }

    impl DynamicalSystem<f64> for Decay {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = -self.rate * x[0];
        }
    }

    struct Clock;

    impl DynamicalSystem<f64> for Clock {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, t: f64, _x: &[f64], out: &mut [f64]) {
            out[0] = t * t;
        }
    }

    #[test]
    fn tableau_weights_are_consistent() {
        assert_relative_eq!(B1 + B2 + B3 + B4 + B5 + B6, 1.0, epsilon = 1e-12);
        assert_relative_eq!(E1 + E2 + E3 + E4 + E5 + E6 + E7, 0.0, epsilon = 1e-14);
    }

    #[test]
    fn rk4_step_matches_exponential_decay() {
        let system = Decay { rate: 1.0 };
        let mut solver = RK4::new(1);
        let mut t = 0.0;
        let mut state = vec![1.0];
        for _ in 0..10 {
            solver.step(&system, &mut t, &mut state, 0.1);
        }
        assert_relative_eq!(t, 1.0, epsilon = 1e-12);
        assert_relative_eq!(state[0], (-1.0f64).exp(), epsilon = 1e-6);
    }

    #[test]
    fn tsit5_integrates_polynomial_in_time_exactly() {
        let mut solver = Tsit5::new(1);
        let mut t = 0.0;
        let mut state = vec![0.0];
        solver.step(&Clock, &mut t, &mut state, 2.0);
        assert_relative_eq!(state[0], 8.0 / 3.0, epsilon = 1e-10);
        assert!(solver.error_estimate()[0].abs() < 1e-10);
    }

    #[test]
    fn tsit5_error_estimate_shrinks_with_step() {
        let system = Decay { rate: 3.0 };
        let mut solver = Tsit5::new(1);

        solver.attempt(&system, 0.0, &[1.0], 0.2);
        let coarse = solver.error_estimate()[0].abs();
        solver.attempt(&system, 0.0, &[1.0], 0.1);
        let fine = solver.error_estimate()[0].abs();

        assert!(fine < coarse, "expected {fine} < {coarse}");
        assert_relative_eq!(solver.candidate()[0], (-0.3f64).exp(), epsilon = 1e-5);
        assert_relative_eq!(solver.initial_slope()[0], -3.0);
    }
}
