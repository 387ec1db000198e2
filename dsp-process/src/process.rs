//! Sample processing

use core::marker::PhantomData;

/// One sample in, one sample out
///
/// Samples are typically raw fixed point integers whose format is held by the
/// processor. A processor owns its delay lines and accumulators, so the output
/// for a sample depends on every sample ingested before it. Runs are sequential:
/// reordering or interleaving the samples of one run changes the result.
pub trait Process<X: Copy, Y = X> {
    /// Ingest a sample, advance the state, emit the output sample
    fn process(&mut self, x: X) -> Y;

    /// Process a slice into an output slice of the same length
    fn block(&mut self, x: &[X], y: &mut [Y]) {
        debug_assert_eq!(x.len(), y.len());
        for (x, y) in x.iter().zip(y) {
            *y = self.process(*x);
        }
    }

    /// Lazily process an input sequence
    ///
    /// The returned iterator borrows the processor and advances its state
    /// by one sample per item.
    fn stream<I: IntoIterator<Item = X>>(&mut self, x: I) -> Stream<'_, Self, I::IntoIter, Y>
    where
        Self: Sized,
    {
        Stream {
            inner: self,
            x: x.into_iter(),
            _y: PhantomData,
        }
    }
}

/// Iterator adapter returned by [`Process::stream()`]
#[derive(Debug)]
pub struct Stream<'a, P, I, Y> {
    inner: &'a mut P,
    x: I,
    _y: PhantomData<fn() -> Y>,
}

impl<X: Copy, Y, P: Process<X, Y>, I: Iterator<Item = X>> Iterator for Stream<'_, P, I, Y> {
    type Item = Y;

    fn next(&mut self) -> Option<Y> {
        self.x.next().map(|x| self.inner.process(x))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.x.size_hint()
    }
}

impl<X: Copy, Y, P: Process<X, Y>, I: ExactSizeIterator<Item = X>> ExactSizeIterator
    for Stream<'_, P, I, Y>
{
}

/// Processing where the output overwrites the input
pub trait Inplace<X: Copy>: Process<X> {
    /// Replace every sample of `xy` with its output
    fn inplace(&mut self, xy: &mut [X]) {
        for xy in xy.iter_mut() {
            *xy = self.process(*xy);
        }
    }
}

impl<X: Copy, Y, T: Process<X, Y>> Process<X, Y> for &mut T {
    fn process(&mut self, x: X) -> Y {
        (*self).process(x)
    }

    fn block(&mut self, x: &[X], y: &mut [Y]) {
        (*self).block(x, y)
    }
}

impl<X: Copy, T: Inplace<X>> Inplace<X> for &mut T {
    fn inplace(&mut self, xy: &mut [X]) {
        (*self).inplace(xy)
    }
}
