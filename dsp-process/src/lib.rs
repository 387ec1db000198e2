#![cfg_attr(not(feature = "std"), no_std)]
#![doc = include_str!("../README.md")]

mod process;
pub use process::*;

#[cfg(test)]
mod test {
    use super::*;

    /// Running sum
    #[derive(Default)]
    struct Integrator(i64);

    impl Process<i32, i64> for Integrator {
        fn process(&mut self, x: i32) -> i64 {
            self.0 += x as i64;
            self.0
        }
    }

    /// One sample delay
    #[derive(Default)]
    struct Delay(i32);

    impl Process<i32> for Delay {
        fn process(&mut self, x: i32) -> i32 {
            core::mem::replace(&mut self.0, x)
        }
    }

    impl Inplace<i32> for Delay {}

    #[test]
    fn misc() {
        let mut i = Integrator::default();
        let mut y = [0; 4];
        i.block(&[1, 2, 3, 4], &mut y);
        assert_eq!(y, [1, 3, 6, 10]);
        assert_eq!((&mut i).process(-10), 0);

        let mut d = Delay::default();
        let mut xy = [3, 0, 0];
        d.inplace(&mut xy);
        assert_eq!(xy, [0, 3, 0]);
        (&mut d).inplace(&mut xy);
        assert_eq!(xy, [0, 0, 3]);

        let mut i = Integrator::default();
        let y = i.stream([1, 1, 1]);
        assert_eq!(y.len(), 3);
        assert_eq!(y.last(), Some(3));
        assert_eq!(i.stream(core::iter::empty::<i32>()).count(), 0);
    }

    #[test]
    fn stream_widening() {
        // i32 samples in, i64 running sums out
        let mut i = Integrator::default();
        let y: Stream<'_, Integrator, core::array::IntoIter<i32, 3>, i64> =
            i.stream([i32::MAX, i32::MAX, 2]);
        assert_eq!(y.size_hint(), (3, Some(3)));
        let mut z = [0i64; 3];
        for (z, y) in z.iter_mut().zip(y) {
            *z = y;
        }
        assert_eq!(z, [i32::MAX as i64, 2 * i32::MAX as i64, 2 * i32::MAX as i64 + 2]);
        let mut d = Delay::default();
        assert!(d.stream([1, 2, 3]).eq([0, 1, 2]));
    }
}
