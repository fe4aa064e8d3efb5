use crate::{Expression, Model, ParameterValues, Scalar};

fn c<T: Scalar>(x: f64) -> Expression<T> {
    Expression::constant(T::from_f64_const(x))
}

/// Lumped single-cell battery model with one RC pair and a lumped thermal state.
///
/// States are the state of charge `z`, the voltage over the RC pair `v1` and the cell temperature
/// `T`, driven by the current `I` (positive on discharge):
///
/// ```text
/// dz/dt  = -I / (3600 Q)
/// dv1/dt = -v1 / (R1 C1) + I / C1
/// dT/dt  = (I^2 R0 + v1^2 / R1 - (T - T_amb) / R_th) / C_th
/// ```
///
/// The ohmic resistance `R0` scales with the electrode thickness, which is a structural parameter
/// and so cannot be an input parameter. "Current function [A]" can be.
pub fn lumped_battery<T: Scalar>() -> (Model<T>, ParameterValues<T>) {
    let current = Expression::<T>::parameter("Current function [A]");
    let capacity = Expression::<T>::parameter("Nominal cell capacity [A.h]");
    let r1 = Expression::<T>::parameter("R1 [Ohm]");
    let c1 = Expression::<T>::parameter("C1 [F]");
    let r_th = Expression::<T>::parameter("Thermal resistance [K.W-1]");
    let c_th = Expression::<T>::parameter("Heat capacity [J.K-1]");
    let t_amb = Expression::<T>::parameter("Ambient temperature [K]");
    let r0 = Expression::<T>::parameter("Internal resistance [Ohm]")
        * Expression::<T>::parameter("Electrode thickness [m]")
        / c::<T>(1e-4);

    let soc = Expression::<T>::state(0);
    let v1 = Expression::<T>::state(1);
    let temperature = Expression::<T>::state(2);

    let ohmic_heating = &current * &current * &r0 + &v1 * &v1 / &r1;
    let ocv = c::<T>(3.2) + &soc;
    let voltage = &ocv - &v1 - &current * &r0;

    let rhs = Expression::concatenate([
        -(&current / (c::<T>(3600.0) * &capacity)),
        -(&v1 / (&r1 * &c1)) + &current / &c1,
        (&ohmic_heating - (&temperature - &t_amb) / &r_th) / &c_th,
    ]);
    let init = Expression::concatenate([
        Expression::<T>::parameter("Initial SoC"),
        c::<T>(0.0),
        t_amb.clone(),
    ]);

    let model = Model::builder("lumped battery")
        .states(3)
        .parameter("Current function [A]")
        .parameter("Nominal cell capacity [A.h]")
        .parameter("Internal resistance [Ohm]")
        .parameter("R1 [Ohm]")
        .parameter("C1 [F]")
        .parameter("Thermal resistance [K.W-1]")
        .parameter("Heat capacity [J.K-1]")
        .parameter("Ambient temperature [K]")
        .parameter("Initial SoC")
        .structural_parameter("Electrode thickness [m]")
        .rhs(rhs)
        .init(init)
        .variable("Voltage [V]", voltage.clone())
        .variable("Open-circuit voltage [V]", ocv)
        .variable("Current [A]", current.clone())
        .variable("State of charge", soc)
        .variable("RC voltage [V]", v1)
        .variable("Temperature [K]", temperature.clone())
        .variable("Temperature [°C]", &temperature - c::<T>(273.15))
        .variable("Ohmic heating [W]", ohmic_heating)
        .variable(
            "Discharge capacity [A.h]",
            (&current / c::<T>(3600.0)).time_integral(),
        )
        .variable(
            "Throughput energy [W.h]",
            (&current * &voltage / c::<T>(3600.0)).time_integral(),
        )
        .variable("Recorded steps", c::<T>(1.0).discrete_sum())
        .variable("Time [h]", Expression::<T>::time() / c::<T>(3600.0))
        .build()
        .expect("lumped battery model is valid");

    let mut parameter_values = ParameterValues::new();
    for (name, value) in [
        ("Current function [A]", 5.0),
        ("Nominal cell capacity [A.h]", 5.0),
        ("Internal resistance [Ohm]", 0.01),
        ("R1 [Ohm]", 0.015),
        ("C1 [F]", 3000.0),
        ("Thermal resistance [K.W-1]", 2.0),
        ("Heat capacity [J.K-1]", 60.0),
        ("Ambient temperature [K]", 298.15),
        ("Initial SoC", 1.0),
        ("Electrode thickness [m]", 1e-4),
    ] {
        parameter_values.set(name, T::from_f64_const(value));
    }
    (model, parameter_values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Inputs, Simulation};

    #[test]
    fn one_hour_discharge() {
        let (model, parameter_values) = lumped_battery::<f64>();
        let mut sim = Simulation::new(model, parameter_values).output_variables([
            "State of charge",
            "Discharge capacity [A.h]",
            "Temperature [°C]",
            "Voltage [V]",
        ]);
        let solution = sim.solve(3600.0, Inputs::new()).unwrap();

        let soc = solution.get("State of charge").unwrap();
        let (_, soc_end) = soc.last().unwrap();
        assert!(soc_end.as_scalar().unwrap().abs() < 1e-6);

        let capacity = solution.get("Discharge capacity [A.h]").unwrap();
        let (_, capacity_end) = capacity.last().unwrap();
        assert!((capacity_end.as_scalar().unwrap() - 5.0).abs() < 1e-6);

        // heats up above ambient
        let temperature = solution.get_at("Temperature [°C]", &[0.0, 3600.0]).unwrap();
        assert!((temperature[0].as_scalar().unwrap() - 25.0).abs() < 1e-9);
        assert!(temperature[1].as_scalar().unwrap() > 25.0);

        let voltage = solution.get("Voltage [V]").unwrap().scalars().unwrap();
        assert!((voltage[0] - 4.15).abs() < 1e-12);
        assert!(voltage.last().unwrap() < &voltage[0]);
    }
}
