//! Neural Network inference.

use std::{
    ops::{Index, RangeInclusive},
    path::Path,
    sync::Arc,
};

use anyhow::{anyhow, bail, Context};
use tract_onnx::prelude::{
    tract_ndarray::{Array4, ArrayD, ArrayView, Dimension},
    tvec, Framework, Graph, InferenceModelExt, SimplePlan, TValue, Tensor, TypedFact, TypedOp,
};

use crate::{
    image::{Color, Image, Resolution},
    rect::{RotatedRect, Vec2f},
};

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A convolutional neural network (CNN) that operates on image data.
///
/// Like the underlying [`NeuralNetwork`], this is a cheaply [`Clone`]able handle.
#[derive(Clone)]
pub struct Cnn {
    nn: NeuralNetwork,
    shape: CnnInputShape,
    input_res: Resolution,
    color_mapper: ColorMapper,
}

impl Cnn {
    /// Creates a CNN wrapper from a [`NeuralNetwork`].
    ///
    /// The network must have exactly one input with a shape that matches the given
    /// [`CnnInputShape`].
    pub fn new(
        nn: NeuralNetwork,
        shape: CnnInputShape,
        color_mapper: ColorMapper,
    ) -> anyhow::Result<Self> {
        let input_res = Self::get_input_res(&nn, shape)?;
        Ok(Self {
            nn,
            shape,
            input_res,
            color_mapper,
        })
    }

    fn get_input_res(nn: &NeuralNetwork, shape: CnnInputShape) -> anyhow::Result<Resolution> {
        let inputs = nn.input_shapes()?;
        let tensor_shape = match &*inputs {
            [shape] => shape,
            _ => bail!(
                "CNN network has to take exactly 1 input, this one takes {}",
                inputs.len(),
            ),
        };

        let (w, h) = match (shape, &**tensor_shape) {
            (CnnInputShape::NCHW, [1, 3, h, w]) | (CnnInputShape::NHWC, [1, h, w, 3]) => (*w, *h),
            _ => bail!(
                "invalid model input shape for {:?} CNN: {:?}",
                shape,
                tensor_shape,
            ),
        };

        Ok(Resolution::new(w.try_into()?, h.try_into()?))
    }

    /// Returns the expected input image size.
    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    /// Runs the network on the part of `image` covered by `roi`, returning the estimated outputs.
    ///
    /// The region is resampled (nearest neighbor) to the network's input resolution, stretching it
    /// if the aspect ratios differ. Parts of `roi` outside of `image` read as [`Color::NULL`].
    pub fn estimate(&self, image: &Image, roi: &RotatedRect) -> anyhow::Result<Outputs> {
        let pixels = sample_roi(image, roi, self.input_res)
            .into_iter()
            .map(|color| self.color_mapper.map(color))
            .collect::<Vec<_>>();
        let (h, w) = (
            self.input_res.height() as usize,
            self.input_res.width() as usize,
        );

        let tensor = match self.shape {
            CnnInputShape::NCHW => Array4::from_shape_fn((1, 3, h, w), |(_, c, y, x)| {
                pixels[y * w + x][c]
            }),
            CnnInputShape::NHWC => Array4::from_shape_fn((1, h, w, 3), |(_, y, x, c)| {
                pixels[y * w + x][c]
            }),
        };

        self.nn.estimate(Tensor::from(tensor))
    }

    /// Maps a point in network input coordinates back to `image` coordinates.
    ///
    /// `roi` must be the region the network was run on.
    pub fn map_to_image(&self, roi: &RotatedRect, x: f32, y: f32) -> Vec2f {
        let scale = self.input_scale(roi);
        roi.transform_out([x * scale.x, y * scale.y])
    }

    /// Returns the size of one network input pixel, in image pixels.
    pub fn input_scale(&self, roi: &RotatedRect) -> Vec2f {
        let size = roi.rect().size();
        Vec2f::new(
            size.x / self.input_res.width() as f32,
            size.y / self.input_res.height() as f32,
        )
    }
}

/// Samples the center of every cell of a `res`-sized grid laid over `roi`, row by row.
fn sample_roi(image: &Image, roi: &RotatedRect, res: Resolution) -> Vec<Color> {
    let size = roi.rect().size();
    let (sx, sy) = (
        size.x / res.width() as f32,
        size.y / res.height() as f32,
    );

    let mut out = Vec::with_capacity(res.num_pixels() as usize);
    for y in 0..res.height() {
        for x in 0..res.width() {
            let local = [(x as f32 + 0.5) * sx, (y as f32 + 0.5) * sy];
            out.push(image.sample_nearest(roi.transform_out(local)));
        }
    }
    out
}

/// Maps 8-bit sRGB colors to the value range a network expects.
///
/// The alpha channel is dropped, so the network sees the RGB channels only.
#[derive(Debug, Clone)]
pub struct ColorMapper {
    target_range: RangeInclusive<f32>,
}

impl ColorMapper {
    /// Creates a simple color mapper that uniformly maps sRGB values to `target_range`.
    ///
    /// Note that this operates on *non-linear* sRGB colors, but maps them linearly to the target
    /// range.
    pub fn linear(target_range: RangeInclusive<f32>) -> Self {
        assert!(target_range.end() > target_range.start());
        Self { target_range }
    }

    fn map(&self, color: Color) -> [f32; 3] {
        let start = *self.target_range.start();
        let end = *self.target_range.end();

        let adjust_range = (end - start) / 255.0;
        let rgb = [color.r(), color.g(), color.b()];
        rgb.map(|col| col as f32 * adjust_range + start)
    }
}

/// Describes in what order a CNN expects its input image data.
///
/// - `N` is the number of images, often fixed at 1.
/// - `C` is the number of color channels, 3 for RGB inputs.
/// - `H` and `W` are the height and width of the input, respectively.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CnnInputShape {
    /// Shape is `[N, C, H, W]`.
    NCHW,
    /// Shape is `[N, H, W, C]`.
    NHWC,
}

/// A neural network that can be used for inference.
///
/// This is a cheaply [`Clone`]able handle to the underlying network structures.
#[derive(Clone)]
pub struct NeuralNetwork(Arc<Model>);

impl NeuralNetwork {
    /// Loads and optimizes a pre-trained model from an ONNX file.
    ///
    /// Returns an error if the file does not exist or is not an ONNX network, or if the network
    /// uses unimplemented operations.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Self::from_path_impl(path.as_ref())
    }

    fn from_path_impl(path: &Path) -> anyhow::Result<Self> {
        match path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => bail!(
                "neural network file must have `.onnx` extension: {}",
                path.display()
            ),
        }

        let model = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .with_context(|| format!("failed to load network from {}", path.display()))?;
        Ok(Self(Arc::new(model)))
    }

    /// Returns the shapes of the network's inputs.
    fn input_shapes(&self) -> anyhow::Result<Vec<Vec<usize>>> {
        let model = self.0.model();
        (0..model.inputs.len())
            .map(|id| {
                let fact = model.input_fact(id)?;
                fact.shape
                    .as_concrete()
                    .map(|shape| shape.to_vec())
                    .ok_or_else(|| anyhow!("network input {id} has a symbolic shape"))
            })
            .collect()
    }

    /// Runs the network on a single input tensor, returning the estimated [`Outputs`].
    #[doc(alias = "infer")]
    pub fn estimate(&self, input: Tensor) -> anyhow::Result<Outputs> {
        let outputs = self.0.run(tvec![TValue::from_const(Arc::new(input))])?;
        let inner = outputs
            .iter()
            .map(|value| Ok(value.to_array_view::<f32>()?.to_owned()))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Outputs { inner })
    }
}

/// The result of a neural network inference pass.
///
/// This is a list of tensors corresponding to the network's output nodes.
#[derive(Debug)]
pub struct Outputs {
    inner: Vec<ArrayD<f32>>,
}

impl Outputs {
    /// Returns the number of tensors in this inference output.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the output tensor at `index`, checking that it has the `expected` shape.
    ///
    /// `D` is the dimensionality to view the tensor as, which has to match `expected.len()`.
    pub fn get_shaped<D: Dimension>(
        &self,
        index: usize,
        expected: &[usize],
    ) -> anyhow::Result<ArrayView<'_, f32, D>> {
        let tensor = self
            .inner
            .get(index)
            .ok_or_else(|| anyhow!("network has no output #{index} ({} outputs)", self.len()))?;
        if tensor.shape() != expected {
            bail!(
                "network output #{index} has shape {:?}, expected {:?}",
                tensor.shape(),
                expected,
            );
        }
        Ok(tensor.view().into_dimensionality::<D>()?)
    }
}

impl Index<usize> for Outputs {
    type Output = ArrayD<f32>;

    fn index(&self, index: usize) -> &ArrayD<f32> {
        &self.inner[index]
    }
}

#[cfg(test)]
impl Outputs {
    pub(crate) fn from_arrays(inner: Vec<ArrayD<f32>>) -> Self {
        Self { inner }
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use tract_onnx::prelude::tract_ndarray::{Ix2, Ix3, IxDyn};

    use super::*;
    use crate::rect::Rect;

    #[test]
    fn color_mapper_ranges() {
        let unit = ColorMapper::linear(0.0..=1.0);
        assert_eq!(unit.map(Color::from_rgb8(0, 255, 0)), [0.0, 1.0, 0.0]);

        let signed = ColorMapper::linear(-1.0..=1.0);
        assert_eq!(signed.map(Color::WHITE), [1.0, 1.0, 1.0]);
        assert_eq!(signed.map(Color::BLACK), [-1.0, -1.0, -1.0]);
    }

    #[test]
    fn sample_roi_letterboxes() {
        let mut image = Image::new(4, 2);
        image.clear(Color::WHITE);

        // Square region centered on a wide image: the top and bottom rows fall outside.
        let roi = image.rect().grow_to_fit_aspect(crate::image::AspectRatio::SQUARE);
        let pixels = sample_roi(&image, &roi.into(), Resolution::new(4, 4));
        assert_eq!(pixels.len(), 16);
        assert!(pixels[..4].iter().all(|&c| c == Color::NULL));
        assert!(pixels[4..12].iter().all(|&c| c == Color::WHITE));
        assert!(pixels[12..].iter().all(|&c| c == Color::NULL));
    }

    #[test]
    fn sample_roi_rotated() {
        let mut image = Image::new(2, 2);
        image.set(0, 0, Color::RED);
        image.set(1, 0, Color::GREEN);
        image.set(1, 1, Color::BLUE);
        image.set(0, 1, Color::WHITE);

        // Upside down: sampling starts at the bottom right.
        let roi = RotatedRect::new(Rect::from_top_left(0.0, 0.0, 2.0, 2.0), PI);
        let pixels = sample_roi(&image, &roi, Resolution::new(2, 2));
        assert_eq!(
            pixels,
            [Color::BLUE, Color::WHITE, Color::GREEN, Color::RED]
        );
    }

    #[test]
    fn output_shape_checks() {
        let outputs = Outputs::from_arrays(vec![ArrayD::zeros(IxDyn(&[1, 63]))]);
        assert!(outputs.get_shaped::<Ix2>(0, &[1, 63]).is_ok());
        assert!(outputs.get_shaped::<Ix2>(0, &[1, 1]).is_err());
        assert!(outputs.get_shaped::<Ix3>(0, &[1, 63]).is_err());
        assert!(outputs.get_shaped::<Ix2>(1, &[1, 63]).is_err());
    }
}
